//! push_notify tool implementation.
//!
//! Turns a raw push body into the notification the platform should show,
//! and optionally resolves a click on it.

use crate::tools::json_result;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use waystation_client::{CacheCoordinator, ClickOutcome, NotificationIntent};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PushNotifyParams {
    /// Raw push body: `{"title": ..., "body": ..., "primaryKey": ...}`.
    pub payload: String,

    /// Simulate a click: `"explore"`, `"close"`, or `""` for the notification body.
    #[serde(default)]
    pub click: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PushNotifyOutput {
    pub notification: NotificationIntent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click: Option<ClickOutcome>,
}

pub async fn push_impl(coordinator: &CacheCoordinator, params: PushNotifyParams) -> Result<CallToolResult, McpError> {
    let notification = coordinator.on_push(&params.payload)?;
    let click = params
        .click
        .as_deref()
        .map(|action| coordinator.on_notification_click(Some(action)));

    json_result(&PushNotifyOutput { notification, click })
}
