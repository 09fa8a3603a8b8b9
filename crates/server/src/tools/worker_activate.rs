//! worker_activate tool implementation.
//!
//! Deletes every cache generation other than the current one.

use rmcp::{ErrorData as McpError, model::CallToolResult};

use super::json_result;
use crate::registration::Registration;

pub async fn activate_impl(registration: &Registration) -> Result<CallToolResult, McpError> {
    let report = registration.activate().await?;
    Ok(json_result(&report)?)
}
