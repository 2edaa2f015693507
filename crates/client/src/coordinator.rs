//! The offline cache coordinator.
//!
//! Owns the worker lifecycle (install, activate), routes every intercepted
//! request to its caching strategy, and forwards sync and push events to the
//! replay queue and notification presenter. All I/O goes through the injected
//! [`CacheStorage`], [`Fetcher`] and [`Clock`].
//!
//! Until activation claims clients, requests pass straight to the network.

use crate::clock::{Clock, timestamp};
use crate::fetch::{self, FetchRequest, FetchResponse, Fetcher, fetch_within};
use crate::notify::{ClickOutcome, NotificationIntent, NotificationPresenter};
use crate::replay::{DrainReport, ReplayQueue, RetryPolicy};
use crate::route::{Partition, RouteKind, Router, Strategy};
use crate::strategy::{OfflineDocument, Outcome, StrategyContext, cache_first, network_first};
use reqwest::{Method, StatusCode, Url};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use waystation_core::{AppConfig, CacheStorage, CachedResponse, Error, PendingActionStore};

/// Lifecycle of the coordinator as a registered worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InstallReport {
    pub partition: String,
    pub cached: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActivateReport {
    pub deleted: Vec<String>,
    pub kept: Vec<String>,
}

pub struct CacheCoordinator {
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    router: Router,
    origin: Url,
    /// Live partitions: static then dynamic. Everything else is swept on activation.
    keep: [String; 2],
    offline_url: Url,
    manifest: Vec<String>,
    network_timeout: Duration,
    dynamic_max_entries: Option<usize>,
    sync_tag: String,
    retry: RetryPolicy,
    state: watch::Sender<WorkerState>,
    lifecycle: Mutex<()>,
    replay: Option<Arc<ReplayQueue>>,
    presenter: NotificationPresenter,
}

impl CacheCoordinator {
    pub fn new(
        config: &AppConfig, storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetcher>, clock: Arc<dyn Clock>,
    ) -> Result<Self, Error> {
        let origin = fetch::canonicalize(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin: {e}")))?;
        let offline_url =
            fetch::resolve(&origin, &config.offline_path).map_err(|e| Error::InvalidUrl(format!("offline path: {e}")))?;
        let (state, _) = watch::channel(WorkerState::Parsed);

        Ok(Self {
            storage,
            fetcher,
            clock,
            router: Router::from_config(config)?,
            origin,
            keep: config.keep_list().map(str::to_string),
            offline_url,
            manifest: config.install_manifest.clone(),
            network_timeout: config.network_timeout(),
            dynamic_max_entries: config.dynamic_max_entries,
            sync_tag: config.sync_tag.clone(),
            retry: RetryPolicy::from_config(config),
            state,
            lifecycle: Mutex::new(()),
            replay: None,
            presenter: NotificationPresenter::from_config(config),
        })
    }

    /// Attach a persistent replay queue backed by `store`.
    pub fn with_replay(mut self, store: Arc<dyn PendingActionStore>) -> Self {
        self.replay = Some(Arc::new(ReplayQueue::new(
            store,
            self.fetcher.clone(),
            self.clock.clone(),
            self.retry,
            self.network_timeout,
        )));
        self
    }

    pub fn replay(&self) -> Option<&Arc<ReplayQueue>> {
        self.replay.as_ref()
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn sync_tag(&self) -> &str {
        &self.sync_tag
    }

    pub fn partition_name(&self, partition: Partition) -> &str {
        match partition {
            Partition::Static => &self.keep[0],
            Partition::Dynamic => &self.keep[1],
        }
    }

    fn keep_list(&self) -> [&str; 2] {
        [self.keep[0].as_str(), self.keep[1].as_str()]
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Whether requests are intercepted.
    pub fn is_controlling(&self) -> bool {
        self.state() == WorkerState::Activated
    }

    fn transition(&self, to: WorkerState) {
        let from = self.state.send_replace(to);
        tracing::info!(?from, ?to, "lifecycle transition");
    }

    /// Resolve a site path or absolute URL against the origin.
    pub fn resolve(&self, input: &str) -> Result<Url, Error> {
        fetch::resolve(&self.origin, input).map_err(|e| Error::InvalidUrl(format!("{input}: {e}")))
    }

    /// Route for a request; `None` when it is not intercepted.
    pub fn route(&self, method: &Method, url: &Url) -> Option<RouteKind> {
        self.router.route(method, url)
    }

    pub fn classify(&self, url: &Url) -> RouteKind {
        self.router.classify(url)
    }

    /// Precache the install manifest into the static partition, all or nothing.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let _guard = self.lifecycle.lock().await;
        match self.state() {
            WorkerState::Parsed | WorkerState::Redundant | WorkerState::Installed => {}
            other => return Err(Error::LifecycleState(format!("cannot install while {other:?}"))),
        }
        self.transition(WorkerState::Installing);

        let partition = self.partition_name(Partition::Static);
        match self.precache(partition).await {
            Ok(entries) => {
                self.transition(WorkerState::Installed);
                let cached: Vec<String> = entries.into_iter().map(|e| e.url).collect();
                tracing::info!(partition, entries = cached.len(), "install complete");
                Ok(InstallReport { partition: partition.to_string(), cached })
            }
            Err(e) => {
                tracing::error!(partition, error = %e, "install failed");
                self.transition(WorkerState::Redundant);
                Err(Error::InstallFailed(e.to_string()))
            }
        }
    }

    async fn precache(&self, partition: &str) -> Result<Vec<CachedResponse>, Error> {
        let stored_at = timestamp(self.clock.now());
        let mut entries = Vec::with_capacity(self.manifest.len());

        for path in &self.manifest {
            let url = self.resolve(path)?;
            let response = fetch_within(self.fetcher.as_ref(), &FetchRequest::get(url.clone()), self.network_timeout).await?;
            if response.status != StatusCode::OK {
                return Err(Error::Network(format!("{url}: HTTP {}", response.status)));
            }
            let mut entry = response.to_cached(&Method::GET, stored_at.clone());
            entry.url = url.to_string();
            entries.push(entry);
        }

        self.storage.put_all(partition, &entries).await?;
        Ok(entries)
    }

    /// Drop every partition outside the keep list and take control of clients.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        let _guard = self.lifecycle.lock().await;
        let before = self.state();
        match before {
            WorkerState::Installed | WorkerState::Activated => {}
            other => return Err(Error::LifecycleState(format!("cannot activate while {other:?}"))),
        }
        self.transition(WorkerState::Activating);

        match self.sweep().await {
            Ok(report) => {
                self.transition(WorkerState::Activated);
                tracing::info!(deleted = ?report.deleted, "activated and controlling clients");
                Ok(report)
            }
            Err(e) => {
                tracing::error!(error = %e, "activate failed");
                self.transition(before);
                Err(Error::ActivateFailed(e.to_string()))
            }
        }
    }

    async fn sweep(&self) -> Result<ActivateReport, Error> {
        let keep = self.keep_list();
        let created_at = timestamp(self.clock.now());
        let mut deleted = Vec::new();

        for name in self.storage.names().await? {
            if !keep.contains(&name.as_str()) && self.storage.delete(&name).await? {
                tracing::info!(partition = %name, "deleted stale partition");
                deleted.push(name);
            }
        }
        for name in keep {
            self.storage.open(name, &created_at).await?;
        }

        Ok(ActivateReport { deleted, kept: keep.iter().map(|s| s.to_string()).collect() })
    }

    /// Handle one request and report which tier answered.
    ///
    /// Errors only for requests that are not cached by any strategy
    /// (pass-through and network-only) when the network fails.
    pub async fn handle_fetch(&self, mut request: FetchRequest) -> Result<Outcome, Error> {
        request.url = fetch::normalize(request.url.clone())
            .map_err(|e| Error::InvalidUrl(format!("{}: {e}", request.url)))?;
        let route = if self.is_controlling() { self.route(&request.method, &request.url) } else { None };

        let strategy = route.map(RouteKind::strategy).unwrap_or(Strategy::NetworkOnly);
        tracing::debug!(method = %request.method, url = %request.url, ?route, ?strategy, "handling fetch");

        let capped = self.dynamic_max_entries.map(|max| (self.partition_name(Partition::Dynamic), max));
        let ctx = StrategyContext {
            storage: self.storage.as_ref(),
            fetcher: self.fetcher.as_ref(),
            clock: self.clock.as_ref(),
            network_timeout: self.network_timeout,
            capped,
        };

        match strategy {
            Strategy::CacheFirst(partition) => Ok(cache_first(&ctx, self.partition_name(partition), &request).await),
            Strategy::NetworkFirst(partition) => {
                let partition = self.partition_name(partition);
                let search = [partition, self.partition_name(Partition::Static)];
                let offline = OfflineDocument { url: &self.offline_url, partitions: &search };
                Ok(network_first(&ctx, partition, &offline, &request).await)
            }
            Strategy::NetworkOnly => ctx.network(&request).await.map(Outcome::Network),
        }
    }

    /// Like [`handle_fetch`](Self::handle_fetch), collapsed to a plain response.
    pub async fn respond(&self, request: FetchRequest) -> Result<FetchResponse, Error> {
        let url = request.url.clone();
        Ok(self.handle_fetch(request).await?.into_response(url))
    }

    /// Background sync event. Drains the replay queue when the tag matches.
    pub async fn on_sync(&self, tag: &str) -> Result<Option<DrainReport>, Error> {
        if tag != self.sync_tag {
            tracing::debug!(tag, "ignoring sync for unknown tag");
            return Ok(None);
        }
        let Some(replay) = &self.replay else {
            tracing::warn!(tag, "sync requested without a replay queue");
            return Ok(None);
        };
        replay.drain().await.map(Some)
    }

    /// Push event: translate the raw body into a notification request.
    pub fn on_push(&self, raw: &str) -> Result<NotificationIntent, Error> {
        let payload = NotificationPresenter::parse(raw)?;
        Ok(self.presenter.present(payload, self.clock.now()))
    }

    pub fn on_notification_click(&self, action: Option<&str>) -> ClickOutcome {
        self.presenter.on_click(action)
    }
}
