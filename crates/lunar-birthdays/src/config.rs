use serde::{Deserialize, Serialize};
use shared_types::{CalendarColor, FreeBusyStatus, Importance};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Microsoft Graph application registration
    #[serde(default)]
    pub graph: GraphSettings,

    #[serde(default)]
    pub birthdays: BirthdaySettings,

    /// Template applied to every created birthday event
    #[serde(default)]
    pub event: EventSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSettings {
    /// Application (client) id from the Azure app registration
    #[serde(default)]
    pub client_id: String,

    /// Directory (tenant) id, or `common` for personal and work accounts
    #[serde(default = "default_tenant_id")]
    pub tenant_id: String,

    /// Delegated permission scopes requested at sign-in
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Path to store the OAuth token cache
    #[serde(default = "default_token_cache")]
    pub token_cache_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BirthdaySettings {
    /// JSON file mapping names to lunar birthdays
    #[serde(default = "default_records_path")]
    pub records_path: PathBuf,

    /// Name of the calendar the events are created in
    #[serde(default = "default_calendar_name")]
    pub calendar_name: String,

    #[serde(default = "default_calendar_color")]
    pub calendar_color: CalendarColor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSettings {
    #[serde(default = "default_reminder_minutes")]
    pub reminder_minutes_before_start: u32,

    #[serde(default = "default_show_as")]
    pub show_as: FreeBusyStatus,

    #[serde(default)]
    pub importance: Importance,

    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
}

fn default_tenant_id() -> String {
    "common".to_string()
}

fn default_scopes() -> Vec<String> {
    vec![
        "user.read".to_string(),
        "calendars.readwrite".to_string(),
        "offline_access".to_string(),
    ]
}

fn default_token_cache() -> String {
    "msgraph_token_cache.json".to_string()
}

fn default_records_path() -> PathBuf {
    PathBuf::from("birthdays.json")
}

fn default_calendar_name() -> String {
    "LunarBirthday".to_string()
}

fn default_calendar_color() -> CalendarColor {
    CalendarColor::LightRed
}

fn default_reminder_minutes() -> u32 {
    1440 // one day
}

fn default_show_as() -> FreeBusyStatus {
    FreeBusyStatus::Free
}

fn default_categories() -> Vec<String> {
    vec!["Birthday".to_string()]
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            tenant_id: default_tenant_id(),
            scopes: default_scopes(),
            token_cache_path: default_token_cache(),
        }
    }
}

impl Default for BirthdaySettings {
    fn default() -> Self {
        Self {
            records_path: default_records_path(),
            calendar_name: default_calendar_name(),
            calendar_color: default_calendar_color(),
        }
    }
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            reminder_minutes_before_start: default_reminder_minutes(),
            show_as: default_show_as(),
            importance: Importance::default(),
            categories: default_categories(),
        }
    }
}

impl Config {
    /// Load the TOML file (if present), apply environment overrides and validate
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`] but without validation, for commands that never
    /// talk to Graph
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!(
                "Config file {} not found, using defaults and environment",
                path.display()
            );
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Override Graph settings from `GRAPH_CLIENT_ID`, `GRAPH_TENANT_ID` and
    /// `GRAPH_SCOPES` (comma separated)
    pub fn apply_env<F>(&mut self, get_var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(client_id) = get_var("GRAPH_CLIENT_ID") {
            self.graph.client_id = client_id;
        }
        if let Some(tenant_id) = get_var("GRAPH_TENANT_ID") {
            self.graph.tenant_id = tenant_id;
        }
        if let Some(scopes) = get_var("GRAPH_SCOPES") {
            self.graph.scopes = scopes
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.graph.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("graph.client_id"));
        }
        if self.graph.tenant_id.trim().is_empty() {
            return Err(ConfigError::Missing("graph.tenant_id"));
        }
        if self.graph.scopes.is_empty() {
            return Err(ConfigError::Missing("graph.scopes"));
        }
        Ok(())
    }

    pub fn example() -> Self {
        Config {
            graph: GraphSettings {
                client_id: "00000000-0000-0000-0000-000000000000".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
