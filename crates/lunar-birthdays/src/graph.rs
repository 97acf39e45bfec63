//! Microsoft Graph calendar client.
//!
//! [`CalendarApi`] is the seam the rest of the crate talks to. The only real
//! implementation is [`GraphSession`], and the only way to get one is
//! [`GraphSession::initialize`], so no calendar call can be made before
//! authentication is set up.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use chrono_tz::Tz;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared_types::graph::{
    Calendar, CalendarColor, CalendarHandle, DateTimeTimeZone, Event, FreeBusyStatus, Importance,
    ItemBody,
};
use std::sync::Arc;

use crate::auth::{DeviceCodeCredential, DeviceCodeInfo, TokenCredential};
use crate::config::GraphSettings;
use crate::error::GraphError;

pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// All event times are wall-clock times in this zone
pub const EVENT_TIME_ZONE: Tz = chrono_tz::Asia::Shanghai;

const GRAPH_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// Create a calendar. Graph does not deduplicate by name.
    async fn create_calendar(
        &self,
        name: &str,
        color: CalendarColor,
    ) -> Result<Calendar, GraphError>;

    async fn create_event(
        &self,
        calendar: &CalendarHandle,
        event: &NewEvent,
    ) -> Result<Event, GraphError>;

    async fn list_calendars(&self) -> Result<Vec<Calendar>, GraphError>;

    async fn list_events(&self, calendar: &CalendarHandle) -> Result<Vec<Event>, GraphError>;
}

/// Event to be created in a calendar
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub subject: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub all_day: bool,
    pub reminder_on: bool,
    pub reminder_minutes: u32,
    pub show_as: FreeBusyStatus,
    pub body: ItemBody,
    pub importance: Importance,
    pub categories: Vec<String>,
}

impl NewEvent {
    pub fn new(subject: impl Into<String>, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            subject: subject.into(),
            start,
            end,
            all_day: false,
            reminder_on: false,
            reminder_minutes: 0,
            show_as: FreeBusyStatus::Busy,
            body: ItemBody::default(),
            importance: Importance::Normal,
            categories: Vec::new(),
        }
    }

    /// Graph request body with times pinned to [`EVENT_TIME_ZONE`]
    pub fn to_graph(&self) -> Event {
        Event {
            subject: Some(self.subject.clone()),
            start: Some(wall_clock(self.start)),
            end: Some(wall_clock(self.end)),
            is_all_day: Some(self.all_day),
            is_reminder_on: Some(self.reminder_on),
            reminder_minutes_before_start: Some(self.reminder_minutes),
            show_as: Some(self.show_as),
            body: Some(self.body.clone()),
            importance: Some(self.importance),
            categories: Some(self.categories.clone()),
            ..Default::default()
        }
    }
}

fn wall_clock(at: NaiveDateTime) -> DateTimeTimeZone {
    DateTimeTimeZone {
        date_time: at.format(GRAPH_DATETIME_FORMAT).to_string(),
        time_zone: EVENT_TIME_ZONE.name().to_string(),
    }
}

/// Handle for a freshly created calendar
pub fn calendar_handle(calendar: &Calendar) -> Result<CalendarHandle, GraphError> {
    calendar
        .id
        .as_deref()
        .map(CalendarHandle::new)
        .ok_or(GraphError::MissingCalendarId)
}

/// One page of a Graph collection
#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Turn a non-success response into a [`GraphError::Api`]
pub fn api_error(status: u16, body: &str) -> GraphError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => GraphError::Api {
            status,
            code: envelope.error.code,
            message: envelope.error.message,
        },
        Err(_) => GraphError::Api {
            status,
            code: "unknown".to_string(),
            message: body.chars().take(200).collect(),
        },
    }
}

/// An authenticated Graph client, shared read-only by every request
pub struct GraphSession {
    http: reqwest::Client,
    credential: Arc<dyn TokenCredential>,
    base_url: String,
}

impl GraphSession {
    /// Set up device code authentication for the configured app registration.
    ///
    /// `on_device_code` is called with the sign-in challenge whenever the user
    /// has to authenticate interactively.
    pub async fn initialize<F>(settings: &GraphSettings, on_device_code: F) -> Result<Self, GraphError>
    where
        F: Fn(&DeviceCodeInfo) + Send + Sync + 'static,
    {
        let credential = DeviceCodeCredential::new(settings, Arc::new(on_device_code)).await?;
        Ok(Self::with_credential(Arc::new(credential)))
    }

    pub fn with_credential(credential: Arc<dyn TokenCredential>) -> Self {
        Self {
            http: reqwest::Client::new(),
            credential,
            base_url: GRAPH_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GraphError> {
        let token = self.credential.access_token().await?;
        let response = request.bearer_auth(token).send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(api_error(status.as_u16(), &text));
        }

        Ok(serde_json::from_str(&text)?)
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GraphError> {
        self.send(self.http.post(self.url(path)).json(body)).await
    }

    /// Fetch every page of a collection by following `@odata.nextLink`
    async fn get_all<T: DeserializeOwned + Send>(&self, path: &str) -> Result<Vec<T>, GraphError> {
        let mut items = Vec::new();
        let mut next = Some(self.url(path));

        while let Some(url) = next {
            let page: Page<T> = self.send(self.http.get(&url)).await?;
            tracing::debug!("Fetched {} items from {}", page.value.len(), url);
            items.extend(page.value);
            next = page.next_link;
        }

        Ok(items)
    }
}

#[async_trait]
impl CalendarApi for GraphSession {
    async fn create_calendar(
        &self,
        name: &str,
        color: CalendarColor,
    ) -> Result<Calendar, GraphError> {
        let calendar = Calendar {
            name: Some(name.to_string()),
            color: Some(color),
            ..Default::default()
        };
        self.post("me/calendars", &calendar).await
    }

    async fn create_event(
        &self,
        calendar: &CalendarHandle,
        event: &NewEvent,
    ) -> Result<Event, GraphError> {
        let path = format!("me/calendars/{}/events", calendar);
        self.post(&path, &event.to_graph()).await
    }

    async fn list_calendars(&self) -> Result<Vec<Calendar>, GraphError> {
        self.get_all("me/calendars").await
    }

    async fn list_events(&self, calendar: &CalendarHandle) -> Result<Vec<Event>, GraphError> {
        self.get_all(&format!("me/calendars/{}/events", calendar))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn midnight(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_new_event_defaults() {
        let event = NewEvent::new("Standup", midnight(2024, 5, 1), midnight(2024, 5, 2));
        let body = serde_json::to_value(event.to_graph()).unwrap();
        assert_eq!(
            body,
            json!({
                "subject": "Standup",
                "start": {"dateTime": "2024-05-01T00:00:00", "timeZone": "Asia/Shanghai"},
                "end": {"dateTime": "2024-05-02T00:00:00", "timeZone": "Asia/Shanghai"},
                "isAllDay": false,
                "isReminderOn": false,
                "reminderMinutesBeforeStart": 0,
                "showAs": "busy",
                "body": {"contentType": "text", "content": ""},
                "importance": "normal",
                "categories": []
            })
        );
    }

    #[test]
    fn test_api_error_decodes_graph_body() {
        let body = r#"{"error":{"code":"ErrorAccessDenied","message":"Access is denied."}}"#;
        match api_error(403, body) {
            GraphError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 403);
                assert_eq!(code, "ErrorAccessDenied");
                assert_eq!(message, "Access is denied.");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_api_error_falls_back_to_raw_body() {
        match api_error(502, "Bad Gateway") {
            GraphError::Api { code, message, .. } => {
                assert_eq!(code, "unknown");
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_page_parsing() {
        let page: Page<Calendar> = serde_json::from_str(
            r#"{"@odata.context":"x","value":[{"id":"a","name":"Calendar"}],
                "@odata.nextLink":"https://graph.microsoft.com/v1.0/me/calendars?$skip=10"}"#,
        )
        .unwrap();
        assert_eq!(page.value.len(), 1);
        assert!(page.next_link.unwrap().ends_with("$skip=10"));
    }

    #[test]
    fn test_calendar_handle_requires_id() {
        let calendar = Calendar {
            id: Some("AAMkADE".to_string()),
            ..Default::default()
        };
        assert_eq!(calendar_handle(&calendar).unwrap().as_str(), "AAMkADE");
        assert!(matches!(
            calendar_handle(&Calendar::default()),
            Err(GraphError::MissingCalendarId)
        ));
    }
}
