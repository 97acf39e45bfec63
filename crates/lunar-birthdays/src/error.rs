//! Error types for the birthday sync library.
//!
//! Each stage has its own enum so callers can tell a bad config file from a bad
//! records file from a failed Graph call. The binary wraps all of them in
//! `anyhow` with extra context.

use shared_types::graph::CalendarHandle;
use shared_types::{LunarDate, ParseLunarDateError};
use std::path::PathBuf;
use thiserror::Error;

/// Missing or invalid settings, detected before any network activity
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A required setting is empty or undefined
    #[error("Configuration error: {0} must be set")]
    Missing(&'static str),
}

/// Problems loading the birthday records file
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Failed to read records file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in records file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid lunar birthday {value:?} for {name}: {source}")]
    InvalidDate {
        name: String,
        value: String,
        #[source]
        source: ParseLunarDateError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LunarError {
    #[error("Lunar year {year} is outside the supported range {first}..={last}")]
    YearOutOfRange { year: i32, first: i32, last: i32 },

    #[error("Lunar month {0} is outside 1..=12")]
    InvalidMonth(u32),

    #[error("Lunar day {day} does not exist in month {month} of {year} ({days_in_month} days)")]
    InvalidDay {
        year: i32,
        month: u32,
        day: u32,
        days_in_month: u32,
    },

    #[error("Solar date for lunar {0} is not representable")]
    SolarOverflow(LunarDate),

    #[error("Lunar birthday {birthday} is after the first projected year {first_year}")]
    BirthAfterStart { birthday: LunarDate, first_year: i32 },

    #[error("Lunar birthday {0} is too far in the future to project")]
    YearOverflow(LunarDate),
}

/// Failures talking to Microsoft Graph or the identity platform
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Failed to set up device code authentication: {0}")]
    AuthSetup(#[source] std::io::Error),

    #[error("Authentication failed: {0}")]
    Auth(#[from] yup_oauth2::Error),

    #[error("Identity platform returned no access token")]
    MissingToken,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status with the decoded Graph error body
    #[error("Graph API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Failed to decode Graph response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Graph created a calendar without an id")]
    MissingCalendarId,

    #[error("Graph created an event in calendar {0} without an id")]
    MissingEventId(CalendarHandle),
}
