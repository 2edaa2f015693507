//! cache_lifecycle tool implementation.

use crate::tools::json_result;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use waystation_client::{ActivateReport, CacheCoordinator, InstallReport, WorkerState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    /// Precache the install manifest.
    Install,
    /// Drop stale partitions and start intercepting requests.
    Activate,
    /// Install then activate.
    InstallAndActivate,
    /// Report the current state only.
    Status,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheLifecycleParams {
    pub action: LifecycleAction,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheLifecycleOutput {
    pub state: WorkerState,
    pub controlling: bool,
    pub install: Option<InstallReport>,
    pub activate: Option<ActivateReport>,
}

pub async fn lifecycle_impl(
    coordinator: &CacheCoordinator, params: CacheLifecycleParams,
) -> Result<CallToolResult, McpError> {
    let (install, activate) = match params.action {
        LifecycleAction::Install => (Some(coordinator.install().await?), None),
        LifecycleAction::Activate => (None, Some(coordinator.activate().await?)),
        LifecycleAction::InstallAndActivate => {
            let install = coordinator.install().await?;
            (Some(install), Some(coordinator.activate().await?))
        }
        LifecycleAction::Status => (None, None),
    };

    json_result(&CacheLifecycleOutput {
        state: coordinator.state(),
        controlling: coordinator.is_controlling(),
        install,
        activate,
    })
}
