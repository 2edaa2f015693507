//! HTTP fetch layer behind the cache coordinator.
//!
//! ### URL Canonicalization
//! - Trim whitespace, ensure scheme (default: `https`)
//! - Lowercase host, remove fragments
//! - Preserve query string
//!
//! ### Transport contract
//! - Any HTTP status is a successful fetch; callers decide what to cache.
//! - Offline, DNS and connection failures map to `Error::Network`.
//! - Timeouts map to `Error::FetchTimeout`.
//! - Max body bytes: 5MB (configurable)

pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode, Url};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, canonicalize, normalize, resolve};

use waystation_core::{AppConfig, CachedResponse, Error};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "waystation/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "waystation/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// An outgoing request as seen by the coordinator.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl FetchRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: HeaderMap::new(), body: None }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Whether the `Accept` header asks for an HTML document.
    pub fn accepts_html(&self) -> bool {
        self.headers
            .get_all(header::ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.to_ascii_lowercase().contains("text/html"))
    }
}

/// Response from a fetch, a partition, or a synthetic failure.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The URL the response answers
    pub url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body bytes
    pub bytes: Bytes,
    /// Time taken to fetch in milliseconds (0 when served locally)
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// A well-formed response standing in for a failure nothing could serve.
    pub fn synthetic(url: Url, status: StatusCode) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        let reason = status.canonical_reason().unwrap_or_default();
        Self { url, status, headers, bytes: Bytes::from(reason), fetch_ms: 0 }
    }

    /// Content-Type header value.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Copy of this response for storage under `method url`.
    pub fn to_cached(&self, method: &Method, stored_at: String) -> CachedResponse {
        CachedResponse {
            method: method.as_str().to_string(),
            url: self.url.to_string(),
            status: self.status.as_u16(),
            status_text: self.status.canonical_reason().unwrap_or_default().to_string(),
            headers: self
                .headers
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
                .collect(),
            body: self.bytes.to_vec(),
            stored_at,
        }
    }

    /// Rebuild a response from a partition entry.
    pub fn from_cached(cached: CachedResponse) -> Result<Self, Error> {
        let url = Url::parse(&cached.url).map_err(|e| Error::CorruptEntry(format!("{}: {e}", cached.url)))?;
        let status = StatusCode::from_u16(cached.status).map_err(|e| Error::CorruptEntry(e.to_string()))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &cached.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::CorruptEntry(e.to_string()))?;
            let value = HeaderValue::from_str(value).map_err(|e| Error::CorruptEntry(e.to_string()))?;
            headers.append(name, value);
        }

        Ok(Self { url, status, headers, bytes: Bytes::from(cached.body), fetch_ms: 0 })
    }
}

/// Network capability injected into the coordinator and replay queue.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Send a request. Any HTTP status is `Ok`; only transport failures are `Err`.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, Error>;
}

/// One attempt through `fetcher`, bounded so a hung transport still fails.
pub async fn fetch_within(fetcher: &dyn Fetcher, request: &FetchRequest, limit: Duration) -> Result<FetchResponse, Error> {
    match tokio::time::timeout(limit, fetcher.fetch(request)).await {
        Ok(result) => result,
        Err(_) => Err(Error::FetchTimeout(format!(
            "{} gave no response within {}ms",
            request.url,
            limit.as_millis()
        ))),
    }
}

/// reqwest-backed fetcher.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn transport_error(url: &Url, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(format!("{url}: {err}"))
    } else {
        Error::Network(format!("{url}: {err}"))
    }
}

#[async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, Error> {
        let start = Instant::now();
        let url = request.url.clone();

        let mut builder = self
            .http
            .request(request.method.clone(), url.as_str())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| transport_error(&url, e))?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.bytes().await.map_err(|e| transport_error(&url, e))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                bytes.len(),
                self.config.max_bytes
            )));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            method = %request.method,
            url = %url,
            status = status.as_u16(),
            bytes = bytes.len(),
            fetch_ms,
            "fetched"
        );

        Ok(FetchResponse { url, status, headers, bytes, fetch_ms })
    }
}
