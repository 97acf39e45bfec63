//! Lunar birthday reminders for Microsoft 365 calendars.
//!
//! Reads lunar birthdays from a JSON file, projects each one onto the solar
//! calendar for every remaining year up to the age horizon and creates one
//! all-day reminder event per year through Microsoft Graph.

pub mod auth;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod graph;
pub mod lunar;
pub mod projector;
pub mod records;

pub use config::Config;
pub use dispatcher::{BatchedDispatcher, DispatchReport, EventTemplate, FailurePolicy};
pub use error::{ConfigError, GraphError, LunarError, RecordError};
pub use graph::{CalendarApi, GraphSession, NewEvent};
pub use lunar::{ChineseLunarCalendar, LunarCalendar};
pub use projector::BirthdayProjector;
pub use records::BirthdayRecordSource;
