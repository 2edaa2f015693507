//! Caching strategies and their tagged outcomes.
//!
//! Strategies never fail outward: every path ends in an [`Outcome`] that
//! names which tier answered, and [`Outcome::into_response`] collapses it to a
//! plain response at the boundary. Synthetic statuses are part of the
//! observable contract: `408` for a cache-first miss with no network, `503`
//! for a network-first miss with nothing to fall back to.

mod cache_first;
mod network_first;

pub(crate) use cache_first::cache_first;
pub(crate) use network_first::{OfflineDocument, network_first};

use crate::clock::{Clock, timestamp};
use crate::fetch::{FetchRequest, FetchResponse, Fetcher, fetch_within};
use reqwest::{Method, StatusCode, Url};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use waystation_core::{CacheStorage, Error};

/// Why a cached or reserved document answered instead of the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// The partition held an entry for the request.
    CachedCopy,
    /// The request wanted HTML and the offline document was cached.
    OfflineDocument,
}

/// Status returned when every tier is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SyntheticStatus {
    RequestTimeout,
    ServiceUnavailable,
}

impl SyntheticStatus {
    pub fn status_code(self) -> StatusCode {
        match self {
            SyntheticStatus::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            SyntheticStatus::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Flat label for reporting which path produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Network,
    Cache,
    CachedCopy,
    OfflineDocument,
    Synthetic,
}

/// Result of handling one request.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Answered by the network, whatever the status.
    Network(FetchResponse),
    /// Answered from the partition without touching the network.
    Cache(FetchResponse),
    /// The network failed and a stored response stood in.
    Fallback(FetchResponse, FallbackReason),
    /// Nothing could answer.
    Failed(SyntheticStatus),
}

impl Outcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Network(_) => OutcomeKind::Network,
            Outcome::Cache(_) => OutcomeKind::Cache,
            Outcome::Fallback(_, FallbackReason::CachedCopy) => OutcomeKind::CachedCopy,
            Outcome::Fallback(_, FallbackReason::OfflineDocument) => OutcomeKind::OfflineDocument,
            Outcome::Failed(_) => OutcomeKind::Synthetic,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Outcome::Network(r) | Outcome::Cache(r) | Outcome::Fallback(r, _) => r.status,
            Outcome::Failed(synthetic) => synthetic.status_code(),
        }
    }

    /// Collapse to the response handed back to the page.
    pub fn into_response(self, url: Url) -> FetchResponse {
        match self {
            Outcome::Network(r) | Outcome::Cache(r) | Outcome::Fallback(r, _) => r,
            Outcome::Failed(synthetic) => FetchResponse::synthetic(url, synthetic.status_code()),
        }
    }
}

/// Collaborators shared by the strategies for one request.
pub(crate) struct StrategyContext<'a> {
    pub storage: &'a dyn CacheStorage,
    pub fetcher: &'a dyn Fetcher,
    pub clock: &'a dyn Clock,
    pub network_timeout: Duration,
    /// Partition kept under a size cap, with the cap.
    pub capped: Option<(&'a str, usize)>,
}

impl StrategyContext<'_> {
    /// One network attempt, bounded so a hung transport still falls back.
    pub async fn network(&self, request: &FetchRequest) -> Result<FetchResponse, Error> {
        fetch_within(self.fetcher, request, self.network_timeout).await
    }

    /// Stored response for `method url`; storage faults count as a miss.
    pub async fn lookup(&self, partition: &str, method: &Method, url: &Url) -> Option<FetchResponse> {
        let cached = match self.storage.lookup(partition, method.as_str(), url.as_str()).await {
            Ok(cached) => cached?,
            Err(e) => {
                tracing::warn!(partition, url = %url, error = %e, "cache lookup failed");
                return None;
            }
        };

        match FetchResponse::from_cached(cached) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!(partition, url = %url, error = %e, "ignoring unreadable cache entry");
                None
            }
        }
    }

    /// Store a copy of an exactly-200 response. Returns whether it was stored.
    pub async fn store(&self, partition: &str, request: &FetchRequest, response: &FetchResponse) -> bool {
        if response.status != StatusCode::OK {
            tracing::debug!(partition, url = %request.url, status = response.status.as_u16(), "not caching");
            return false;
        }

        let mut entry = response.to_cached(&request.method, timestamp(self.clock.now()));
        entry.url = request.url.to_string();

        if let Err(e) = self.storage.put(partition, &entry).await {
            tracing::warn!(partition, url = %request.url, error = %e, "cache write failed");
            return false;
        }

        if let Some((capped, max_entries)) = self.capped
            && capped == partition
        {
            match self.storage.purge_lru(partition, max_entries).await {
                Ok(0) => {}
                Ok(evicted) => tracing::debug!(partition, evicted, "trimmed partition"),
                Err(e) => tracing::warn!(partition, error = %e, "partition trim failed"),
            }
        }

        true
    }
}
