//! Cache-related MCP tools.
//!
//! `cache_fetch` drives requests through the coordinator, `cache_lifecycle`
//! installs and activates it, and `cache_get` / `cache_purge` inspect and trim
//! partitions directly.

pub mod fetch;
pub mod get;
pub mod lifecycle;
pub mod purge;

pub use fetch::{CacheFetchParams, fetch_impl};
pub use get::{CacheGetParams, get_impl};
pub use lifecycle::{CacheLifecycleParams, lifecycle_impl};
pub use purge::{CachePurgeParams, purge_impl};
