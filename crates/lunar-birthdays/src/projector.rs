//! Expands lunar birthday records into one solar-calendar occurrence per year.

use chrono::{Datelike, Utc};
use shared_types::{BirthdayOccurrence, BirthdayRecord, LunarDate};

use crate::error::LunarError;
use crate::graph::EVENT_TIME_ZONE;
use crate::lunar::LunarCalendar;

/// Oldest age a birthday is projected for. Ages count the birth year as one,
/// so the last projected year is `birth year + HORIZON_YEARS - 1`.
pub const HORIZON_YEARS: i32 = 120;

/// Current year in the time zone events are created in
pub fn current_year() -> i32 {
    Utc::now().with_timezone(&EVENT_TIME_ZONE).year()
}

pub fn occurrence_title(name: &str, age: i32) -> String {
    format!("{}'s {}th lunar birthday", name, age)
}

pub struct BirthdayProjector<'a, L: LunarCalendar + ?Sized> {
    calendar: &'a L,
    horizon: i32,
}

impl<'a, L: LunarCalendar + ?Sized> BirthdayProjector<'a, L> {
    pub fn new(calendar: &'a L) -> Self {
        Self {
            calendar,
            horizon: HORIZON_YEARS,
        }
    }

    /// Occurrences from `current_year` up to the horizon age, in year order.
    ///
    /// A birthday after `current_year` is rejected. Years the calendar cannot
    /// convert are skipped with a warning; any other conversion failure aborts
    /// the projection.
    pub fn project(
        &self,
        record: &BirthdayRecord,
        current_year: i32,
    ) -> Result<Vec<BirthdayOccurrence>, LunarError> {
        let birthday = record.lunar_birthday;
        if birthday.year > current_year {
            return Err(LunarError::BirthAfterStart {
                birthday,
                first_year: current_year,
            });
        }
        let last_year = birthday
            .year
            .checked_add(self.horizon - 1)
            .ok_or(LunarError::YearOverflow(birthday))?;
        if current_year > last_year {
            return Ok(Vec::new());
        }

        let supported = self.calendar.supported_years();
        let mut occurrences = Vec::with_capacity((last_year - current_year + 1) as usize);
        let mut skipped = 0;

        for year in current_year..=last_year {
            if !supported.contains(&year) {
                skipped += 1;
                continue;
            }

            // A 30th-day birthday falls on the 29th in short months
            let days_in_month = self.calendar.days_in_month(year, birthday.month)?;
            let date = LunarDate::new(year, birthday.month, birthday.day.min(days_in_month));
            let conversion = self.calendar.convert(date)?;

            occurrences.push(BirthdayOccurrence {
                title: occurrence_title(&record.name, year - birthday.year + 1),
                solar_date: conversion.solar_date,
                lunar_label: conversion.label,
            });
        }

        if skipped > 0 {
            tracing::warn!(
                "Skipped {} of {}'s birthdays outside lunar years {}..={}",
                skipped,
                record.name,
                supported.start(),
                supported.end()
            );
        }

        Ok(occurrences)
    }

    /// Project every record, concatenated in record order
    pub fn project_all(
        &self,
        records: &[BirthdayRecord],
        current_year: i32,
    ) -> Result<Vec<BirthdayOccurrence>, LunarError> {
        let mut occurrences = Vec::new();
        for record in records {
            occurrences.extend(self.project(record, current_year)?);
        }
        Ok(occurrences)
    }
}
