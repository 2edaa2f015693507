//! cache_get tool implementation.
//!
//! Reads a stored response from a partition, or lists a partition's URLs.

use crate::tools::json_result;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use waystation_client::{CacheCoordinator, Partition};
use waystation_core::{CachedResponse, Error};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Partition name (default: the dynamic partition).
    #[serde(default)]
    pub partition: Option<String>,

    /// Site path or absolute URL. When absent, the partition's URLs are listed.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoredEntry {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8, lossily.
    pub body: String,
    pub stored_at: String,
}

impl From<CachedResponse> for StoredEntry {
    fn from(cached: CachedResponse) -> Self {
        let body = String::from_utf8_lossy(&cached.body).into_owned();
        Self {
            url: cached.url,
            status: cached.status,
            status_text: cached.status_text,
            headers: cached.headers,
            body,
            stored_at: cached.stored_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub partition: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<StoredEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
}

pub async fn get_impl(coordinator: &CacheCoordinator, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let partition = params
        .partition
        .unwrap_or_else(|| coordinator.partition_name(Partition::Dynamic).to_string());
    let storage = coordinator.storage();

    let Some(url) = params.url else {
        let urls = storage.keys(&partition).await?;
        return json_result(&CacheGetOutput { partition, entry: None, urls: Some(urls) });
    };

    let url = coordinator.resolve(&url)?;
    let entry = storage
        .lookup(&partition, "GET", url.as_str())
        .await?
        .ok_or_else(|| Error::CacheMiss(format!("{url} in {partition}")))?;

    json_result(&CacheGetOutput { partition, entry: Some(entry.into()), urls: None })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{coordinator, output};

    #[tokio::test]
    async fn test_get_missing() {
        let (coordinator, _) = coordinator().await;
        let params = CacheGetParams { partition: None, url: Some("/nope".into()) };

        assert!(get_impl(&coordinator, params).await.is_err());
    }

    #[tokio::test]
    async fn test_get_found_and_listed() {
        let (coordinator, net) = coordinator().await;
        net.serve("http://localhost:3000/", 200, "home");
        coordinator.install().await.unwrap();

        let params = CacheGetParams { partition: Some("static-v1".into()), url: Some("/".into()) };
        let out: CacheGetOutput = output(&get_impl(&coordinator, params).await.unwrap());
        let entry = out.entry.unwrap();
        assert_eq!(entry.status, 200);
        assert_eq!(entry.body, "home");

        let params = CacheGetParams { partition: Some("static-v1".into()), url: None };
        let out: CacheGetOutput = output(&get_impl(&coordinator, params).await.unwrap());
        assert_eq!(out.urls.unwrap(), vec!["http://localhost:3000/"]);
    }
}
