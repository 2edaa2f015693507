//! Push message to notification translation. Stateless.

use crate::clock::timestamp;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use waystation_core::{AppConfig, Error};

/// Vibration pattern in milliseconds: buzz, pause, buzz.
pub const VIBRATE_PATTERN: [u32; 3] = [100, 50, 100];

pub const ACTION_EXPLORE: &str = "explore";
pub const ACTION_CLOSE: &str = "close";

/// Inbound push body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub primary_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NotificationData {
    pub date_of_arrival: String,
    pub primary_key: Option<String>,
}

/// Request to the platform to show a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NotificationIntent {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
    pub actions: Vec<NotificationAction>,
}

/// What to do after the user touched a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "url", rename_all = "snake_case")]
pub enum ClickOutcome {
    OpenWindow(String),
    Dismiss,
}

#[derive(Debug, Clone)]
pub struct NotificationPresenter {
    icon: String,
    badge: String,
}

impl NotificationPresenter {
    pub fn new(icon: impl Into<String>, badge: impl Into<String>) -> Self {
        Self { icon: icon.into(), badge: badge.into() }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.notification_icon, &config.notification_badge)
    }

    /// Parse a raw push body.
    pub fn parse(raw: &str) -> Result<PushPayload, Error> {
        serde_json::from_str(raw).map_err(|e| Error::InvalidPayload(e.to_string()))
    }

    pub fn present(&self, payload: PushPayload, arrived_at: DateTime<Utc>) -> NotificationIntent {
        NotificationIntent {
            title: payload.title,
            body: payload.body,
            icon: self.icon.clone(),
            badge: self.badge.clone(),
            vibrate: VIBRATE_PATTERN.to_vec(),
            data: NotificationData { date_of_arrival: timestamp(arrived_at), primary_key: payload.primary_key },
            actions: vec![
                NotificationAction { action: ACTION_EXPLORE.to_string(), title: "Explore".to_string() },
                NotificationAction { action: ACTION_CLOSE.to_string(), title: "Close".to_string() },
            ],
        }
    }

    /// Map a click to a follow-up. `None` or an empty action is a click on the body.
    pub fn on_click(&self, action: Option<&str>) -> ClickOutcome {
        match action.unwrap_or_default() {
            "" | ACTION_EXPLORE => ClickOutcome::OpenWindow("/".to_string()),
            ACTION_CLOSE => ClickOutcome::Dismiss,
            other => {
                tracing::debug!(action = other, "unknown notification action, dismissing");
                ClickOutcome::Dismiss
            }
        }
    }
}
