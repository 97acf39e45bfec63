//! Chinese lunisolar calendar conversion.
//!
//! Conversion sits behind the [`LunarCalendar`] trait so projection code never
//! depends on how solar dates are computed. [`ChineseLunarCalendar`] delegates
//! the astronomy to `tyme4rs`.

use chrono::NaiveDate;
use shared_types::LunarDate;
use std::ops::RangeInclusive;
use tyme4rs::tyme::lunar::{LunarDay, LunarMonth, LunarYear, LUNAR_DAY_NAMES};

use crate::error::LunarError;

/// Result of converting one lunar date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LunarConversion {
    pub solar_date: NaiveDate,
    /// Traditional label, e.g. `二〇二四年三月十五`
    pub label: String,
}

pub trait LunarCalendar: Send + Sync {
    /// Convert a lunar date (regular month) to its solar date
    fn convert(&self, date: LunarDate) -> Result<LunarConversion, LunarError>;

    /// Number of days (29 or 30) in the regular month of a lunar year
    fn days_in_month(&self, year: i32, month: u32) -> Result<u32, LunarError>;

    /// Lunar years this calendar can convert
    fn supported_years(&self) -> RangeInclusive<i32>;
}

/// Earliest lunar year converted. Earlier solar dates would be Julian.
const FIRST_YEAR: i32 = 1600;
/// Latest lunar year whose twelfth month still ends inside solar year 9999
const LAST_YEAR: i32 = 9998;

const DIGITS: [&str; 10] = ["〇", "一", "二", "三", "四", "五", "六", "七", "八", "九"];
const MONTHS: [&str; 12] = [
    "正", "二", "三", "四", "五", "六", "七", "八", "九", "十", "冬", "腊",
];

/// Chinese lunisolar calendar backed by `tyme4rs`
#[derive(Debug, Clone, Copy, Default)]
pub struct ChineseLunarCalendar;

impl ChineseLunarCalendar {
    pub fn new() -> Self {
        ChineseLunarCalendar
    }

    fn lunar_month(year: i32, month: u32) -> Result<LunarMonth, LunarError> {
        if !(1..=12).contains(&month) {
            return Err(LunarError::InvalidMonth(month));
        }
        let out_of_range = LunarError::YearOutOfRange {
            year,
            first: FIRST_YEAR,
            last: LAST_YEAR,
        };
        if !(FIRST_YEAR..=LAST_YEAR).contains(&year) {
            return Err(out_of_range);
        }
        LunarYear::new(year as isize).map_err(|_| out_of_range)?;

        // Positive months are the regular (non-leap) months
        LunarMonth::new(year as isize, month as isize).map_err(|_| LunarError::InvalidMonth(month))
    }
}

impl LunarCalendar for ChineseLunarCalendar {
    fn convert(&self, date: LunarDate) -> Result<LunarConversion, LunarError> {
        let days_in_month = self.days_in_month(date.year, date.month)?;
        let invalid_day = LunarError::InvalidDay {
            year: date.year,
            month: date.month,
            day: date.day,
            days_in_month,
        };
        if date.day == 0 || date.day > days_in_month {
            return Err(invalid_day);
        }

        let day = LunarDay::new(date.year as isize, date.month as isize, date.day as usize)
            .map_err(|_| invalid_day)?;
        let solar = day.get_solar_day();
        let solar_date = NaiveDate::from_ymd_opt(
            solar.get_year() as i32,
            solar.get_month() as u32,
            solar.get_day() as u32,
        )
        .ok_or(LunarError::SolarOverflow(date))?;

        Ok(LunarConversion {
            solar_date,
            label: lunar_label(date),
        })
    }

    fn days_in_month(&self, year: i32, month: u32) -> Result<u32, LunarError> {
        Ok(Self::lunar_month(year, month)?.get_day_count() as u32)
    }

    fn supported_years(&self) -> RangeInclusive<i32> {
        FIRST_YEAR..=LAST_YEAR
    }
}

/// Format a lunar date the traditional way: `一九九〇年三月十五`.
///
/// Month and day must already be validated.
pub fn lunar_label(date: LunarDate) -> String {
    let year: String = date
        .year
        .unsigned_abs()
        .to_string()
        .bytes()
        .map(|digit| DIGITS[usize::from(digit - b'0')])
        .collect();

    format!(
        "{}年{}月{}",
        year,
        MONTHS[(date.month - 1) as usize],
        LUNAR_DAY_NAMES[(date.day - 1) as usize]
    )
}
