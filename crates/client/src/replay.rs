//! Background replay of actions captured while offline.
//!
//! A drain walks the live queue oldest first and replays each action once.
//! Ordering is strict: when an action must be retried later, the drain stops
//! so nothing behind it overtakes it. Actions that can never succeed are
//! flagged dead and kept in the store rather than dropped.

use crate::clock::{Clock, timestamp};
use crate::fetch::{FetchRequest, Fetcher, fetch_within};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use waystation_core::{AppConfig, Error, NewAction, PendingAction, PendingActionStore, ReplayFailure};

/// How often and how patiently a failing action is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.replay_max_attempts,
            base_backoff: Duration::from_millis(config.replay_backoff_ms),
            max_backoff: Duration::from_millis(config.replay_max_backoff_ms),
        }
    }

    /// Delay before the next try after `attempts` failures: `base * 2^(attempts-1)`, capped.
    pub fn backoff(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(31);
        self.base_backoff
            .checked_mul(1u32 << exponent)
            .map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }
}

/// Summary of one drain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DrainReport {
    /// Ids replayed successfully and removed.
    pub replayed: Vec<i64>,
    /// Ids flagged dead during this drain.
    pub dead_lettered: Vec<i64>,
    /// Id of the action that stopped the drain, if any.
    pub halted_at: Option<i64>,
    /// Another drain held the queue; nothing was attempted.
    pub already_running: bool,
}

enum Attempt {
    Delivered,
    Retry(String),
    Reject(String),
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn to_request(action: &PendingAction) -> Result<FetchRequest, Error> {
    let method = Method::from_bytes(action.method.as_bytes())
        .map_err(|_| Error::InvalidInput(format!("unsupported method {}", action.method)))?;
    let url = Url::parse(&action.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", action.url)))?;

    let mut request = FetchRequest::new(method, url);
    for (name, value) in &action.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("header {name}: {e}")))?;
        let value = HeaderValue::from_str(value).map_err(|e| Error::InvalidInput(format!("header {name}: {e}")))?;
        request = request.with_header(name, value);
    }
    if let Some(body) = &action.body {
        request = request.with_body(body.clone());
    }
    Ok(request)
}

fn is_due(action: &PendingAction, now: DateTime<Utc>) -> bool {
    match action.next_attempt_at.as_deref().map(DateTime::parse_from_rfc3339) {
        Some(Ok(at)) => at.with_timezone(&Utc) <= now,
        _ => true,
    }
}

/// Ordered, persistent outbox for offline writes.
pub struct ReplayQueue {
    store: Arc<dyn PendingActionStore>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    network_timeout: Duration,
    draining: Mutex<()>,
}

impl ReplayQueue {
    pub fn new(
        store: Arc<dyn PendingActionStore>, fetcher: Arc<dyn Fetcher>, clock: Arc<dyn Clock>, policy: RetryPolicy,
        network_timeout: Duration,
    ) -> Self {
        Self { store, fetcher, clock, policy, network_timeout, draining: Mutex::new(()) }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Validate and append an action.
    pub async fn enqueue(&self, action: NewAction) -> Result<i64, Error> {
        let candidate = PendingAction {
            id: 0,
            method: action.method.to_uppercase(),
            url: action.url.clone(),
            headers: action.headers.clone(),
            body: action.body.clone(),
            enqueued_at: String::new(),
            attempts: 0,
            next_attempt_at: None,
            last_error: None,
            dead: false,
        };
        to_request(&candidate)?;

        let action = NewAction { method: candidate.method, ..action };
        let id = self.store.enqueue(&action, &timestamp(self.clock.now())).await?;
        tracing::info!(id, method = %action.method, url = %action.url, "queued offline action");
        Ok(id)
    }

    pub async fn pending(&self) -> Result<Vec<PendingAction>, Error> {
        self.store.pending().await
    }

    pub async fn dead(&self) -> Result<Vec<PendingAction>, Error> {
        self.store.dead().await
    }

    /// Replay queued actions in order. Never runs concurrently with itself.
    pub async fn drain(&self) -> Result<DrainReport, Error> {
        let Ok(_guard) = self.draining.try_lock() else {
            tracing::debug!("replay drain already running");
            return Ok(DrainReport { already_running: true, ..DrainReport::default() });
        };

        let mut report = DrainReport::default();
        for action in self.store.pending().await? {
            let now = self.clock.now();
            if !is_due(&action, now) {
                tracing::debug!(id = action.id, next_attempt_at = ?action.next_attempt_at, "replay not yet due");
                report.halted_at = Some(action.id);
                break;
            }

            match self.attempt(&action).await {
                Attempt::Delivered => {
                    self.store.remove(action.id).await?;
                    report.replayed.push(action.id);
                }
                Attempt::Reject(error) => {
                    self.bury(&action, error).await?;
                    report.dead_lettered.push(action.id);
                }
                Attempt::Retry(error) => {
                    let attempts = action.attempts + 1;
                    if attempts >= self.policy.max_attempts {
                        self.bury(&action, format!("gave up after {attempts} attempts: {error}"))
                            .await?;
                        report.dead_lettered.push(action.id);
                        continue;
                    }

                    let delay = self.policy.backoff(attempts);
                    let next = chrono::TimeDelta::from_std(delay)
                        .ok()
                        .and_then(|d| now.checked_add_signed(d))
                        .unwrap_or(DateTime::<Utc>::MAX_UTC);
                    tracing::warn!(id = action.id, attempts, retry_in_ms = delay.as_millis() as u64, error = %error, "replay failed");
                    let failure =
                        ReplayFailure { error, next_attempt_at: Some(timestamp(next)), dead: false };
                    self.store.record_failure(action.id, &failure).await?;
                    report.halted_at = Some(action.id);
                    break;
                }
            }
        }

        tracing::info!(
            replayed = report.replayed.len(),
            dead_lettered = report.dead_lettered.len(),
            halted_at = ?report.halted_at,
            "replay drain finished"
        );
        Ok(report)
    }

    async fn attempt(&self, action: &PendingAction) -> Attempt {
        let request = match to_request(action) {
            Ok(request) => request,
            Err(e) => return Attempt::Reject(e.to_string()),
        };

        match fetch_within(self.fetcher.as_ref(), &request, self.network_timeout).await {
            Ok(response) if response.status.is_success() => {
                tracing::info!(id = action.id, status = response.status.as_u16(), "replayed action");
                Attempt::Delivered
            }
            Ok(response) if is_retryable(response.status) => Attempt::Retry(format!("HTTP {}", response.status)),
            Ok(response) => Attempt::Reject(format!("HTTP {}", response.status)),
            Err(e) if e.is_transport() => Attempt::Retry(e.to_string()),
            Err(e) => Attempt::Reject(e.to_string()),
        }
    }

    async fn bury(&self, action: &PendingAction, error: String) -> Result<(), Error> {
        tracing::error!(id = action.id, url = %action.url, error = %error, "action dead-lettered");
        let failure = ReplayFailure { error, next_attempt_at: None, dead: true };
        self.store.record_failure(action.id, &failure).await
    }
}
