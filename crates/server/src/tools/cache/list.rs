//! cache_list tool implementation.
//!
//! Lists every persisted cache generation with its entry count.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use keepsake_core::WorkerState;

use crate::registration::Registration;
use crate::tools::json_result;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationInfo {
    pub name: String,
    pub entries: usize,
    /// Whether this is the generation the worker reads and writes.
    pub current: bool,
}

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheListOutput {
    pub current: String,
    pub state: WorkerState,
    /// Whether page fetches currently go through the worker.
    pub controlling: bool,
    pub generations: Vec<GenerationInfo>,
}

pub async fn list_impl(registration: &Registration) -> Result<CallToolResult, McpError> {
    let worker = registration.worker();
    let store = worker.store();

    let mut generations = Vec::new();
    for name in store.list_names().await? {
        let entries = store.keys(&name).await?.len();
        let current = name == worker.version_tag();
        generations.push(GenerationInfo { name, entries, current });
    }

    let output = CacheListOutput {
        current: worker.version_tag().to_string(),
        state: registration.state().await,
        controlling: registration.is_controlling().await,
        generations,
    };

    Ok(json_result(&output)?)
}
