//! replay_enqueue and replay_sync tool implementations.

use crate::error::ToolError;
use crate::tools::json_result;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use waystation_client::{CacheCoordinator, DrainReport};
use waystation_core::{NewAction, PendingAction};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReplayEnqueueParams {
    /// HTTP method of the captured write.
    pub method: String,

    /// Site path or absolute URL.
    pub url: String,

    #[serde(default)]
    pub headers: Vec<(String, String)>,

    /// Request body as text.
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReplayEnqueueOutput {
    pub id: i64,
    pub pending: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReplaySyncParams {
    /// Sync tag (default: the configured tag).
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReplaySyncOutput {
    /// Absent when the tag did not match.
    pub report: Option<DrainReport>,
    pub pending: Vec<PendingAction>,
    pub dead: Vec<PendingAction>,
}

pub async fn enqueue_impl(
    coordinator: &CacheCoordinator, params: ReplayEnqueueParams,
) -> Result<CallToolResult, McpError> {
    let queue = coordinator.replay().ok_or(ToolError::ReplayDisabled)?;
    let url = coordinator.resolve(&params.url)?;

    let action = NewAction {
        method: params.method,
        url: url.to_string(),
        headers: params.headers,
        body: params.body.map(String::into_bytes),
    };
    let id = queue.enqueue(action).await?;
    let pending = queue.pending().await?.len();

    json_result(&ReplayEnqueueOutput { id, pending })
}

pub async fn sync_impl(coordinator: &CacheCoordinator, params: ReplaySyncParams) -> Result<CallToolResult, McpError> {
    let queue = coordinator.replay().ok_or(ToolError::ReplayDisabled)?;
    let tag = params.tag.unwrap_or_else(|| coordinator.sync_tag().to_string());

    let report = coordinator.on_sync(&tag).await?;

    json_result(&ReplaySyncOutput { report, pending: queue.pending().await?, dead: queue.dead().await? })
}
