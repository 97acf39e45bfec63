use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod graph;

pub use graph::{
    BodyType, Calendar, CalendarColor, CalendarHandle, DateTimeTimeZone, Event, FreeBusyStatus,
    Importance, ItemBody,
};

/// A date in the Chinese lunisolar calendar. Months always refer to the
/// regular (non-leap) month of the given lunar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LunarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl LunarDate {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }
}

impl fmt::Display for LunarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.year, self.month, self.day)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseLunarDateError {
    #[error("expected YYYY-M-D, got {0:?}")]
    Format(String),

    #[error("{component} {value:?} is not a number")]
    NotANumber {
        component: &'static str,
        value: String,
    },

    #[error("year {0} is outside 1..=9999")]
    Year(i32),

    #[error("month {0} is outside 1..=12")]
    Month(u32),

    #[error("day {0} is outside 1..=30")]
    Day(u32),
}

impl FromStr for LunarDate {
    type Err = ParseLunarDateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('-').collect();
        let [year, month, day] = parts.as_slice() else {
            return Err(ParseLunarDateError::Format(s.to_string()));
        };

        let year: i32 = parse_component("year", year)?;
        let month: u32 = parse_component("month", month)?;
        let day: u32 = parse_component("day", day)?;

        if !(1..=9999).contains(&year) {
            return Err(ParseLunarDateError::Year(year));
        }
        if !(1..=12).contains(&month) {
            return Err(ParseLunarDateError::Month(month));
        }
        if !(1..=30).contains(&day) {
            return Err(ParseLunarDateError::Day(day));
        }

        Ok(LunarDate { year, month, day })
    }
}

fn parse_component<T: FromStr>(
    component: &'static str,
    value: &str,
) -> Result<T, ParseLunarDateError> {
    value
        .trim()
        .parse()
        .map_err(|_| ParseLunarDateError::NotANumber {
            component,
            value: value.to_string(),
        })
}

/// One person's lunar birthday as read from the records file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirthdayRecord {
    pub name: String,
    pub lunar_birthday: LunarDate,
}

/// A single birthday projected onto the solar calendar for one year
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirthdayOccurrence {
    pub title: String,
    pub solar_date: NaiveDate,
    pub lunar_label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lunar_date() {
        let date: LunarDate = "1990-3-15".parse().unwrap();
        assert_eq!(date, LunarDate::new(1990, 3, 15));

        let padded: LunarDate = "1990-03-05".parse().unwrap();
        assert_eq!(padded, LunarDate::new(1990, 3, 5));
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        let err = "1990-March-15".parse::<LunarDate>().unwrap_err();
        assert_eq!(
            err,
            ParseLunarDateError::NotANumber {
                component: "month",
                value: "March".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        assert!(matches!(
            "1990/3/15".parse::<LunarDate>(),
            Err(ParseLunarDateError::Format(_))
        ));
        assert!(matches!(
            "1990-3".parse::<LunarDate>(),
            Err(ParseLunarDateError::Format(_))
        ));
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        assert_eq!(
            "1990-13-1".parse::<LunarDate>(),
            Err(ParseLunarDateError::Month(13))
        );
        assert_eq!(
            "1990-1-31".parse::<LunarDate>(),
            Err(ParseLunarDateError::Day(31))
        );
        assert_eq!(
            "2147483600-1-1".parse::<LunarDate>(),
            Err(ParseLunarDateError::Year(2147483600))
        );
        assert_eq!(
            "0-1-1".parse::<LunarDate>(),
            Err(ParseLunarDateError::Year(0))
        );
    }

    #[test]
    fn test_display_round_trips_input_form() {
        assert_eq!(LunarDate::new(1990, 3, 15).to_string(), "1990-3-15");
    }
}
