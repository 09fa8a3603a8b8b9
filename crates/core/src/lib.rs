//! Core types and caching policy for keepsake.
//!
//! This crate provides:
//! - Versioned response cache with SQLite and in-memory backends
//! - The offline worker policy (install, activate, fetch interception)
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod url;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheDb, CacheHandle, CacheStore, MemoryStore, RequestKey, StoredResponse};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use http::{Request, Response, ResponseKind};
pub use net::Network;
pub use worker::{FetchOutcome, OfflineWorker, ResponseSource, WorkerConfig, WorkerState};
