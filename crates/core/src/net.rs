//! Network capability consumed by the worker.

use async_trait::async_trait;

use crate::Error;
use crate::http::{Request, Response};

/// Issues requests on behalf of the worker.
///
/// `Ok` covers every response the server produced, including 4xx/5xx.
/// `Err` means the request itself was rejected: unreachable host, timeout,
/// oversized body.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}
