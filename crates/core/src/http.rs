//! Request and response model seen by the worker.
//!
//! Headers and bodies are opaque: they are carried through untouched and
//! only the status and response kind drive caching decisions.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;

/// Ordered header list, passed through as received.
pub type Headers = Vec<(String, String)>;

/// An outgoing request issued by the controlled page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub headers: Headers,
    pub body: Bytes,
}

impl Request {
    /// Build a request with an arbitrary method and no headers or body.
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self { method: method.into(), url, headers: Vec::new(), body: Bytes::new() }
    }

    /// Build a plain GET request.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// Parse the URL and build a GET request.
    pub fn get_str(url: &str) -> Result<Self, Error> {
        let url = crate::url::canonicalize(url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self::get(url))
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Only GET requests are ever matched or stored.
    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

/// How the runtime classifies a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin response.
    Basic,
    /// Cross-origin response readable by the page.
    Cors,
    /// Cross-origin response the page cannot read.
    Opaque,
    /// Network-level error response.
    Error,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Basic => "basic",
            ResponseKind::Cors => "cors",
            ResponseKind::Opaque => "opaque",
            ResponseKind::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "basic" => Some(ResponseKind::Basic),
            "cors" => Some(ResponseKind::Cors),
            "opaque" => Some(ResponseKind::Opaque),
            "error" => Some(ResponseKind::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response, either fresh from the network or replayed from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub kind: ResponseKind,
    pub headers: Headers,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, kind: ResponseKind, body: impl Into<Bytes>) -> Self {
        Self { status, kind, headers: Vec::new(), body: body.into() }
    }

    /// Same-origin 200 response.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(200, ResponseKind::Basic, body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Only a 200 with a readable kind may be written to the cache.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && matches!(self.kind, ResponseKind::Basic | ResponseKind::Cors)
    }
}
