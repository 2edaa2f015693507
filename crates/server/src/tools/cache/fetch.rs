//! cache_fetch tool implementation.
//!
//! Sends one request through the coordinator as if a page had issued it.

use crate::error::ToolError;
use crate::tools::json_result;
use reqwest::Method;
use reqwest::header::{self, HeaderName, HeaderValue};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use waystation_client::{CacheCoordinator, FetchRequest, OutcomeKind, RouteKind};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheFetchParams {
    /// Site path (resolved against the origin) or absolute URL.
    pub url: String,

    /// HTTP method (default: GET). Only GET is ever cached.
    #[serde(default = "default_method")]
    pub method: String,

    /// Accept header. Include `text/html` to behave like a page navigation.
    #[serde(default)]
    pub accept: Option<String>,

    /// Extra request headers.
    #[serde(default)]
    pub headers: Vec<(String, String)>,

    /// Request body as text.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheFetchOutput {
    pub url: String,
    /// Route the request took; absent when it passed straight to the network.
    pub route: Option<RouteKind>,
    pub controlling: bool,
    pub outcome: OutcomeKind,
    pub status: u16,
    pub content_type: Option<String>,
    /// Body decoded as UTF-8, lossily.
    pub body: String,
    pub bytes: usize,
}

fn build_request(coordinator: &CacheCoordinator, params: CacheFetchParams) -> Result<FetchRequest, McpError> {
    if params.url.trim().is_empty() {
        return Err(ToolError::InvalidInput("url cannot be empty".into()).into());
    }

    let method = Method::from_bytes(params.method.to_uppercase().as_bytes())
        .map_err(|_| ToolError::InvalidInput(format!("unsupported method: {}", params.method)))?;
    let url = coordinator.resolve(&params.url)?;

    let mut request = FetchRequest::new(method, url);
    if let Some(accept) = params.accept {
        let value = HeaderValue::from_str(&accept).map_err(|e| ToolError::InvalidInput(format!("accept: {e}")))?;
        request = request.with_header(header::ACCEPT, value);
    }
    for (name, value) in params.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ToolError::InvalidInput(format!("header {name}: {e}")))?;
        let value = HeaderValue::from_str(&value).map_err(|e| ToolError::InvalidInput(format!("header {name}: {e}")))?;
        request = request.with_header(name, value);
    }
    if let Some(body) = params.body {
        request = request.with_body(body);
    }
    Ok(request)
}

pub async fn fetch_impl(coordinator: &CacheCoordinator, params: CacheFetchParams) -> Result<CallToolResult, McpError> {
    let request = build_request(coordinator, params)?;
    let url = request.url.clone();
    let controlling = coordinator.is_controlling();
    let route = if controlling { coordinator.route(&request.method, &url) } else { None };

    let outcome = coordinator.handle_fetch(request).await?;
    let kind = outcome.kind();
    let response = outcome.into_response(url.clone());

    json_result(&CacheFetchOutput {
        url: url.to_string(),
        route,
        controlling,
        outcome: kind,
        status: response.status.as_u16(),
        content_type: response.content_type().map(str::to_string),
        body: String::from_utf8_lossy(&response.bytes).into_owned(),
        bytes: response.bytes.len(),
    })
}
