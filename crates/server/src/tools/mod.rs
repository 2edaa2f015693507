//! MCP tool implementations.
//!
//! Each tool takes the shared [`CacheCoordinator`] and returns its output as
//! pretty-printed JSON text content.

pub mod cache;
pub mod push;
pub mod replay;

use crate::error::ToolError;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(|e| ToolError::Serialize(e.to_string()))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use rmcp::model::CallToolResult;
    use serde::de::DeserializeOwned;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use waystation_client::{CacheCoordinator, FetchRequest, FetchResponse, Fetcher, SystemClock};
    use waystation_core::{AppConfig, CacheDb, Error};

    /// Serves canned bodies by URL; anything else is offline.
    #[derive(Default)]
    pub struct CannedFetcher {
        pages: Mutex<HashMap<String, (u16, String)>>,
    }

    impl CannedFetcher {
        pub fn serve(&self, url: &str, status: u16, body: &str) {
            self.pages.lock().unwrap().insert(url.to_string(), (status, body.to_string()));
        }

        pub fn unplug(&self) {
            self.pages.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl Fetcher for CannedFetcher {
        async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, Error> {
            let page = self.pages.lock().unwrap().get(request.url.as_str()).cloned();
            let (status, body) = page.ok_or_else(|| Error::Network(format!("{}: offline", request.url)))?;
            Ok(FetchResponse {
                url: request.url.clone(),
                status: StatusCode::from_u16(status).unwrap(),
                headers: Default::default(),
                bytes: body.into(),
                fetch_ms: 1,
            })
        }
    }

    pub async fn coordinator() -> (Arc<CacheCoordinator>, Arc<CannedFetcher>) {
        let config = AppConfig {
            install_manifest: vec!["/".to_string()],
            network_timeout_ms: 200,
            ..AppConfig::default()
        };
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let net = Arc::new(CannedFetcher::default());
        let coordinator = CacheCoordinator::new(&config, db.clone(), net.clone(), Arc::new(SystemClock))
            .unwrap()
            .with_replay(db);
        (Arc::new(coordinator), net)
    }

    pub fn output<T: DeserializeOwned>(result: &CallToolResult) -> T {
        let content = serde_json::to_value(&result.content[0]).unwrap();
        let text = content.get("text").and_then(|v| v.as_str()).unwrap();
        serde_json::from_str(text).unwrap()
    }
}
