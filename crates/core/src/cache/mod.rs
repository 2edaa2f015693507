//! SQLite-backed storage for cache partitions and offline actions.
//!
//! This module provides persistent storage using SQLite with async access
//! via tokio-rusqlite. It supports:
//!
//! - Named partitions keyed by SHA-256 of method and canonical URL
//! - All-or-nothing bulk population for install-time precaching
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - LRU and age-based trimming
//! - An ordered, durable queue of pending offline actions

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod partitions;
pub mod pending;

pub use crate::Error;

pub use connection::CacheDb;
pub use partitions::{CacheStorage, CachedResponse};
pub use pending::{NewAction, PendingAction, PendingActionStore, ReplayFailure};
