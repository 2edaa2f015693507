//! cache_purge tool implementation.
//!
//! Trims a partition by age or by count.

use crate::error::ToolError;
use crate::tools::json_result;
use chrono::TimeDelta;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use waystation_client::{CacheCoordinator, clock::timestamp};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Partition to trim.
    pub partition: String,

    /// Purge entries stored more than this many days ago.
    pub older_than_days: Option<i64>,

    /// Keep only the newest N entries (LRU purge).
    pub max_entries: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of entries deleted.
    pub deleted: u64,
}

pub async fn purge_impl(coordinator: &CacheCoordinator, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    if params.older_than_days.is_none() && params.max_entries.is_none() {
        return Err(ToolError::InvalidInput("at least one of older_than_days or max_entries must be specified".into()).into());
    }

    let storage = coordinator.storage();
    let mut deleted = 0u64;

    if let Some(days) = params.older_than_days {
        let age = TimeDelta::try_days(days.max(0))
            .ok_or_else(|| ToolError::InvalidInput(format!("older_than_days out of range: {days}")))?;
        let cutoff = coordinator
            .clock()
            .now()
            .checked_sub_signed(age)
            .ok_or_else(|| ToolError::InvalidInput(format!("older_than_days out of range: {days}")))?;
        let cutoff = timestamp(cutoff);
        deleted += storage.purge_older_than(&params.partition, &cutoff).await?;
    }

    if let Some(max_entries) = params.max_entries {
        deleted += storage.purge_lru(&params.partition, max_entries).await?;
    }

    tracing::info!(partition = %params.partition, deleted, "purged partition");
    json_result(&CachePurgeOutput { deleted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{coordinator, output};

    #[tokio::test]
    async fn test_purge_lru() {
        let (coordinator, net) = coordinator().await;
        net.serve("http://localhost:3000/", 200, "home");
        net.serve("http://localhost:3000/a", 200, "a");
        coordinator.install().await.unwrap();
        coordinator.activate().await.unwrap();
        coordinator
            .respond(waystation_client::FetchRequest::get(coordinator.resolve("/a").unwrap()))
            .await
            .unwrap();

        let params = CachePurgeParams { partition: "dynamic-v1".into(), older_than_days: None, max_entries: Some(0) };
        let out: CachePurgeOutput = output(&purge_impl(&coordinator, params).await.unwrap());

        assert_eq!(out.deleted, 1);
    }

    #[tokio::test]
    async fn test_purge_by_age_keeps_recent() {
        let (coordinator, net) = coordinator().await;
        net.serve("http://localhost:3000/", 200, "home");
        coordinator.install().await.unwrap();

        let params = CachePurgeParams { partition: "static-v1".into(), older_than_days: Some(1), max_entries: None };
        let out: CachePurgeOutput = output(&purge_impl(&coordinator, params).await.unwrap());

        assert_eq!(out.deleted, 0);
    }

    #[tokio::test]
    async fn test_purge_huge_age_is_rejected() {
        let (coordinator, net) = coordinator().await;
        net.serve("http://localhost:3000/", 200, "home");
        coordinator.install().await.unwrap();

        for days in [1_000_000_000, i64::MAX] {
            let params =
                CachePurgeParams { partition: "static-v1".into(), older_than_days: Some(days), max_entries: None };
            assert!(purge_impl(&coordinator, params).await.is_err(), "{days}");
        }
        assert_eq!(coordinator.storage().keys("static-v1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_purge_no_params() {
        let (coordinator, _) = coordinator().await;
        let params = CachePurgeParams { partition: "static-v1".into(), older_than_days: None, max_entries: None };

        assert!(purge_impl(&coordinator, params).await.is_err());
    }
}
