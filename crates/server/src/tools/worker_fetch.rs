//! worker_fetch tool implementation.
//!
//! Sends one request from the page through the registration: cache-first
//! for media, network-first for the rest, straight to the network before
//! the worker is active.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use keepsake_core::{Error, Request, Response, ResponseKind, ResponseSource};

use super::json_result;
use crate::registration::Registration;

/// Input parameters for worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchParams {
    /// Absolute URL, or a path resolved against the page origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Optional request body, sent as UTF-8.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchOutput {
    /// The resolved request URL.
    pub url: String,
    pub method: String,
    pub status: u16,
    pub kind: ResponseKind,
    /// Whether the response came from the cache, the network or a pass-through.
    pub source: ResponseSource,
    pub headers: Vec<(String, String)>,
    pub body_len: usize,
    /// Body as text, present only for textual content types.
    pub body_text: Option<String>,
}

pub async fn fetch_impl(
    registration: &Registration, origin: &Url, params: WorkerFetchParams,
) -> Result<CallToolResult, McpError> {
    let url = keepsake_core::url::resolve(origin, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    let method = params.method.trim().to_ascii_uppercase();
    if method.is_empty() {
        return Err(Error::InvalidInput("method must not be empty".into()).into());
    }

    let mut request = Request::new(method.clone(), url.clone());
    for (name, value) in params.headers {
        request = request.with_header(name, value);
    }
    if let Some(body) = params.body {
        request = request.with_body(body);
    }

    let served = registration.fetch(request).await?;

    tracing::debug!(
        url = %url,
        method = %method,
        status = served.response.status,
        source = ?served.source,
        "worker_fetch served"
    );

    let output = WorkerFetchOutput {
        url: url.to_string(),
        method,
        status: served.response.status,
        kind: served.response.kind,
        source: served.source,
        body_len: served.response.body.len(),
        body_text: text_body(&served.response),
        headers: served.response.headers,
    };

    Ok(json_result(&output)?)
}

fn is_textual(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    mime.starts_with("text/")
        || mime.ends_with("+json")
        || mime.ends_with("+xml")
        || matches!(mime.as_str(), "application/json" | "application/javascript" | "application/xml")
}

fn text_body(response: &Response) -> Option<String> {
    let content_type = response.header("content-type")?;
    if !is_textual(content_type) {
        return None;
    }
    Some(String::from_utf8_lossy(&response.body).into_owned())
}
