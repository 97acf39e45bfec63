use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use lunar_birthdays::dispatcher::DEFAULT_WINDOW;
use lunar_birthdays::{
    BatchedDispatcher, BirthdayProjector, BirthdayRecordSource, CalendarApi, ChineseLunarCalendar,
    EventTemplate, FailurePolicy, GraphError, LunarCalendar, NewEvent,
};
use shared_types::graph::{Calendar, CalendarColor, CalendarHandle, Event};
use shared_types::{BirthdayOccurrence, LunarDate};
use std::collections::HashSet;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory calendar that records every call and fails chosen subjects
#[derive(Default)]
struct FakeCalendar {
    log: Mutex<Vec<String>>,
    events: Mutex<Vec<NewEvent>>,
    failing: HashSet<String>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeCalendar {
    fn failing(subjects: &[&str]) -> Self {
        Self {
            failing: subjects.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl CalendarApi for FakeCalendar {
    async fn create_calendar(
        &self,
        name: &str,
        color: CalendarColor,
    ) -> Result<Calendar, GraphError> {
        Ok(Calendar {
            id: Some(format!("cal-{}", name)),
            name: Some(name.to_string()),
            color: Some(color),
            ..Default::default()
        })
    }

    async fn create_event(
        &self,
        _calendar: &CalendarHandle,
        event: &NewEvent,
    ) -> Result<Event, GraphError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.log.lock().unwrap().push(format!("start {}", event.subject));

        // Let the other requests of the window start before this one settles
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        self.log.lock().unwrap().push(format!("end {}", event.subject));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&event.subject) {
            return Err(GraphError::Api {
                status: 429,
                code: "TooManyRequests".to_string(),
                message: "Slow down".to_string(),
            });
        }

        let mut events = self.events.lock().unwrap();
        events.push(event.clone());
        Ok(Event {
            id: Some(format!("evt-{}", events.len())),
            subject: Some(event.subject.clone()),
            ..Default::default()
        })
    }

    async fn list_calendars(&self) -> Result<Vec<Calendar>, GraphError> {
        Ok(Vec::new())
    }

    async fn list_events(&self, _calendar: &CalendarHandle) -> Result<Vec<Event>, GraphError> {
        Ok(Vec::new())
    }
}

fn occurrences(count: usize) -> Vec<BirthdayOccurrence> {
    let first = NaiveDate::from_ymd_opt(2024, 4, 23).unwrap();
    (0..count)
        .map(|i| BirthdayOccurrence {
            title: format!("event {}", i),
            solar_date: first + chrono::Duration::days(365 * i as i64),
            lunar_label: format!("label {}", i),
        })
        .collect()
}

fn handle() -> CalendarHandle {
    CalendarHandle::new("cal-LunarBirthday")
}

#[tokio::test]
async fn test_dispatch_uses_ceil_n_over_window_windows() {
    let calendar = FakeCalendar::default();
    let dispatcher = BatchedDispatcher::new(&calendar, EventTemplate::default());

    let report = dispatcher.dispatch(&handle(), &occurrences(5)).await;

    assert_eq!(DEFAULT_WINDOW, 2);
    assert_eq!(report.windows, 3);
    assert_eq!(report.created.len(), 5);
    assert!(report.is_success());
    assert_eq!(
        report.created,
        vec!["evt-1", "evt-2", "evt-3", "evt-4", "evt-5"]
    );
}

#[tokio::test]
async fn test_dispatch_empty_input_makes_no_requests() {
    let calendar = FakeCalendar::default();
    let report = BatchedDispatcher::new(&calendar, EventTemplate::default())
        .dispatch(&handle(), &[])
        .await;

    assert_eq!(report.windows, 0);
    assert_eq!(report.attempted(), 0);
    assert!(calendar.log().is_empty());
}

#[tokio::test]
async fn test_windows_run_concurrently_but_in_sequence() {
    let calendar = FakeCalendar::default();
    BatchedDispatcher::new(&calendar, EventTemplate::default())
        .dispatch(&handle(), &occurrences(4))
        .await;

    assert_eq!(calendar.max_in_flight.load(Ordering::SeqCst), 2);
    assert_eq!(
        calendar.log(),
        vec![
            "start event 0",
            "start event 1",
            "end event 0",
            "end event 1",
            "start event 2",
            "start event 3",
            "end event 2",
            "end event 3",
        ]
    );
}

#[tokio::test]
async fn test_wider_window() {
    let calendar = FakeCalendar::default();
    let report = BatchedDispatcher::new(&calendar, EventTemplate::default())
        .with_window(4)
        .dispatch(&handle(), &occurrences(9))
        .await;

    assert_eq!(report.windows, 3);
    assert_eq!(calendar.max_in_flight.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_failures_do_not_stop_later_windows() {
    let calendar = FakeCalendar::failing(&["event 1", "event 4"]);
    let report = BatchedDispatcher::new(&calendar, EventTemplate::default())
        .dispatch(&handle(), &occurrences(6))
        .await;

    assert_eq!(report.windows, 3);
    assert_eq!(report.attempted(), 6);
    assert_eq!(report.created.len(), 4);
    assert_eq!(report.skipped, 0);
    assert!(!report.is_success());

    let failed: Vec<&str> = report.failures.iter().map(|f| f.title.as_str()).collect();
    assert_eq!(failed, vec!["event 1", "event 4"]);
    assert!(matches!(
        report.failures[0].error,
        GraphError::Api { status: 429, .. }
    ));
}

#[tokio::test]
async fn test_abort_on_failure_skips_remaining_windows() {
    let calendar = FakeCalendar::failing(&["event 2"]);
    let report = BatchedDispatcher::new(&calendar, EventTemplate::default())
        .with_policy(FailurePolicy::AbortOnFailure)
        .dispatch(&handle(), &occurrences(7))
        .await;

    // The failing window still settles completely
    assert_eq!(report.windows, 2);
    assert_eq!(report.attempted(), 4);
    assert_eq!(report.created.len(), 3);
    assert_eq!(report.skipped, 3);
    assert!(!calendar.log().iter().any(|line| line.ends_with("event 4")));
}

#[tokio::test]
async fn test_records_to_calendar_events() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"Alice": "1990-3-15", "Bob": "2020-1-1"}}"#).unwrap();

    let records = BirthdayRecordSource::new(file.path()).load().await.unwrap();
    let lunar = ChineseLunarCalendar::new();
    let occurrences = BirthdayProjector::new(&lunar)
        .project_all(&records, 2024)
        .unwrap();

    // Alice: ages 35..=120, Bob: ages 5..=120
    assert_eq!(occurrences.len(), 86 + 116);

    let calendar = FakeCalendar::default();
    let created = calendar
        .create_calendar("LunarBirthday", CalendarColor::LightRed)
        .await
        .unwrap();
    let handle = lunar_birthdays::graph::calendar_handle(&created).unwrap();

    let report = BatchedDispatcher::new(&calendar, EventTemplate::default())
        .dispatch(&handle, &occurrences)
        .await;
    assert!(report.is_success());
    assert_eq!(report.windows, 101);

    let events = calendar.events.lock().unwrap();
    assert_eq!(events.len(), 202);

    let first = &events[0];
    let expected = lunar.convert(LunarDate::new(2024, 3, 15)).unwrap();
    assert_eq!(first.subject, "Alice's 35th lunar birthday");
    assert_eq!(first.start.date(), expected.solar_date);
    assert_eq!(first.body.content, expected.label);
    assert!(first.all_day);
    assert!(first.reminder_on);

    let last_alice = &events[85];
    assert_eq!(last_alice.subject, "Alice's 120th lunar birthday");
    assert_eq!(last_alice.start.date().year(), 2109);

    let last_bob = events.last().unwrap();
    assert_eq!(last_bob.subject, "Bob's 120th lunar birthday");
    assert_eq!(last_bob.start.date().year(), 2139);
}
