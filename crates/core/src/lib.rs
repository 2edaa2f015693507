//! Core types and shared functionality for waystation.
//!
//! This crate provides:
//! - Cache partition and pending-action storage with a SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheStorage, CachedResponse, NewAction, PendingAction, PendingActionStore, ReplayFailure};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
