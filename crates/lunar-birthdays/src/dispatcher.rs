//! Submits birthday occurrences to a calendar in small concurrent windows.
//!
//! Occurrences are split into fixed-size windows in their original order. The
//! requests of one window run concurrently and all of them settle before the
//! next window starts. A failed request is logged and recorded in the
//! [`DispatchReport`]; whether later windows still run is decided by the
//! [`FailurePolicy`].

use chrono::{Duration, NaiveTime};
use futures::future::join_all;
use shared_types::graph::{CalendarHandle, FreeBusyStatus, Importance, ItemBody};
use shared_types::BirthdayOccurrence;

use crate::config::EventSettings;
use crate::error::GraphError;
use crate::graph::{CalendarApi, NewEvent};

/// Requests in flight at once
pub const DEFAULT_WINDOW: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record failures and keep going
    #[default]
    Continue,
    /// Stop after the first window containing a failure
    AbortOnFailure,
}

#[derive(Debug)]
pub struct DispatchFailure {
    pub title: String,
    pub error: GraphError,
}

#[derive(Debug, Default)]
pub struct DispatchReport {
    pub windows: usize,
    /// Ids of the created events, in submission order
    pub created: Vec<String>,
    pub failures: Vec<DispatchFailure>,
    /// Occurrences never submitted because the run was aborted
    pub skipped: usize,
}

impl DispatchReport {
    pub fn attempted(&self) -> usize {
        self.created.len() + self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.skipped == 0
    }
}

/// Event fields shared by every birthday event
#[derive(Debug, Clone)]
pub struct EventTemplate {
    pub reminder_minutes: u32,
    pub show_as: FreeBusyStatus,
    pub importance: Importance,
    pub categories: Vec<String>,
}

impl From<&EventSettings> for EventTemplate {
    fn from(settings: &EventSettings) -> Self {
        Self {
            reminder_minutes: settings.reminder_minutes_before_start,
            show_as: settings.show_as,
            importance: settings.importance,
            categories: settings.categories.clone(),
        }
    }
}

impl Default for EventTemplate {
    fn default() -> Self {
        Self::from(&EventSettings::default())
    }
}

impl EventTemplate {
    /// All-day event on the solar date with the lunar date as its body
    pub fn event_for(&self, occurrence: &BirthdayOccurrence) -> NewEvent {
        let start = occurrence.solar_date.and_time(NaiveTime::MIN);
        NewEvent {
            all_day: true,
            reminder_on: true,
            reminder_minutes: self.reminder_minutes,
            show_as: self.show_as,
            body: ItemBody::text(occurrence.lunar_label.clone()),
            importance: self.importance,
            categories: self.categories.clone(),
            ..NewEvent::new(occurrence.title.clone(), start, start + Duration::days(1))
        }
    }
}

pub struct BatchedDispatcher<'a, C: CalendarApi + ?Sized> {
    client: &'a C,
    template: EventTemplate,
    window: usize,
    policy: FailurePolicy,
}

impl<'a, C: CalendarApi + ?Sized> BatchedDispatcher<'a, C> {
    pub fn new(client: &'a C, template: EventTemplate) -> Self {
        Self {
            client,
            template,
            window: DEFAULT_WINDOW,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn dispatch(
        &self,
        calendar: &CalendarHandle,
        occurrences: &[BirthdayOccurrence],
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        let mut submitted = 0;

        for window in occurrences.chunks(self.window) {
            tracing::debug!(
                "Submitting window {} ({} events)",
                report.windows + 1,
                window.len()
            );
            let results = join_all(
                window
                    .iter()
                    .map(|occurrence| self.submit(calendar, occurrence)),
            )
            .await;
            report.windows += 1;
            submitted += window.len();

            let mut window_failed = false;
            for (occurrence, result) in window.iter().zip(results) {
                match result {
                    Ok(id) => {
                        tracing::info!("Event created with id {}", id);
                        report.created.push(id);
                    }
                    Err(error) => {
                        tracing::error!("Error creating event {}: {}", occurrence.title, error);
                        window_failed = true;
                        report.failures.push(DispatchFailure {
                            title: occurrence.title.clone(),
                            error,
                        });
                    }
                }
            }

            if window_failed && self.policy == FailurePolicy::AbortOnFailure {
                report.skipped = occurrences.len() - submitted;
                tracing::warn!(
                    "Aborting after window {}, {} events not submitted",
                    report.windows,
                    report.skipped
                );
                break;
            }
        }

        report
    }

    async fn submit(
        &self,
        calendar: &CalendarHandle,
        occurrence: &BirthdayOccurrence,
    ) -> Result<String, GraphError> {
        let event = self.template.event_for(occurrence);
        let created = self.client.create_event(calendar, &event).await?;
        created
            .id
            .ok_or_else(|| GraphError::MissingEventId(calendar.clone()))
    }
}
