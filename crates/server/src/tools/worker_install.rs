//! worker_install tool implementation.
//!
//! Runs the install phase and, since install always asks to skip waiting,
//! the activate phase right after it.

use rmcp::{ErrorData as McpError, model::CallToolResult};

use super::json_result;
use crate::registration::Registration;

pub async fn install_impl(registration: &Registration) -> Result<CallToolResult, McpError> {
    let report = registration.start().await;

    tracing::info!(
        cache = %report.install.cache_name,
        stored = report.install.stored.len(),
        failed = report.install.failed.len(),
        activated = report.activate.is_some(),
        "worker_install finished"
    );

    Ok(json_result(&report)?)
}
