//! Network backend for keepsake.
//!
//! This crate provides the reqwest-based implementation of
//! [`keepsake_core::Network`] used by the server.

pub mod fetch;

pub use fetch::{FetchConfig, HttpNetwork, response_kind};
