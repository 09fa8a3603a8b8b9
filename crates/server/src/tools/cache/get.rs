//! cache_get tool implementation.
//!
//! Looks up a request in the current cache generation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use keepsake_core::{Error, Request, ResponseKind};

use crate::registration::Registration;
use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Absolute URL, or a path resolved against the page origin.
    pub url: String,

    /// HTTP method (default: GET). Only GET entries are ever stored.
    #[serde(default)]
    pub method: Option<String>,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub cache_name: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub kind: ResponseKind,
    pub headers: Vec<(String, String)>,
    pub body_len: usize,
    /// RFC 3339 timestamp of the write.
    pub stored_at: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(
    registration: &Registration, origin: &Url, params: CacheGetParams,
) -> Result<CallToolResult, McpError> {
    let url = keepsake_core::url::resolve(origin, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let method = params.method.unwrap_or_else(|| "GET".into());

    let cache = registration.worker().current_cache();
    let request = Request::new(method, url);
    let entry = cache
        .match_request(&request)
        .await?
        .ok_or_else(|| Error::CacheMiss(format!("{} {}", request.method, request.url)))?;

    let output = CacheGetOutput {
        cache_name: cache.name().to_string(),
        method: entry.key.method,
        url: entry.key.url,
        status: entry.response.status,
        kind: entry.response.kind,
        body_len: entry.response.body.len(),
        headers: entry.response.headers,
        stored_at: entry.stored_at,
    };

    Ok(json_result(&output)?)
}
