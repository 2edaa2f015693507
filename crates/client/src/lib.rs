//! Client side of waystation.
//!
//! This crate provides the HTTP fetcher, request routing, the caching
//! strategies, and the [`CacheCoordinator`] that ties them to the worker
//! lifecycle, background replay and push notifications.

pub mod clock;
pub mod coordinator;
pub mod fetch;
pub mod notify;
pub mod replay;
pub mod route;
pub mod strategy;

#[cfg(test)]
mod testing;

pub use clock::{Clock, SystemClock};
pub use coordinator::{ActivateReport, CacheCoordinator, InstallReport, WorkerState};
pub use fetch::{FetchClient, FetchConfig, FetchRequest, FetchResponse, Fetcher};
pub use notify::{ClickOutcome, NotificationIntent, NotificationPresenter, PushPayload};
pub use replay::{DrainReport, ReplayQueue, RetryPolicy};
pub use route::{Partition, RouteKind, Router, Strategy};
pub use strategy::{FallbackReason, Outcome, OutcomeKind, SyntheticStatus};
