//! MCP tool implementations.
//!
//! Worker tools drive the lifecycle and route requests; cache tools inspect
//! what the store holds.

pub mod cache;
pub mod worker_activate;
pub mod worker_fetch;
pub mod worker_install;

pub use worker_activate::activate_impl;
pub use worker_fetch::{WorkerFetchParams, fetch_impl};
pub use worker_install::install_impl;

use keepsake_core::Error;
use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

/// Wrap a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, Error> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
