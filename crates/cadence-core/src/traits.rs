use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{AppError, TransportError};

/// HTTP verb for an outbound request. Catalog lookups are read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
}

/// One fully-resolved request handed to a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Per-call deadline.
    pub timeout: Duration,
}

/// Raw response from a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a single HTTP request. No retries, no throttling.
pub trait Transport: Send + Sync + Clone + 'static {
    fn send(
        &self,
        request: &HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

/// Fetches and merges detail for one enrichment slot.
///
/// Used by [`ConcurrentEnricher`](crate::enrich::ConcurrentEnricher): each
/// worker calls `fetch` for the slot it owns, then either `apply` on success
/// or `fallback` on failure.
pub trait DetailFetcher: Send + Sync {
    type Item: Send;
    type Detail: Send;

    /// Perform the network lookup for `item`.
    fn fetch(
        &self,
        item: &Self::Item,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Self::Detail, AppError>> + Send;

    /// Overwrite the derived fields of `item` with fetched detail.
    fn apply(&self, item: &mut Self::Item, detail: Self::Detail);

    /// Fill derived fields locally when the lookup failed.
    fn fallback(&self, item: &mut Self::Item);

    /// Human-readable context for warnings, e.g. `"artist - title"`.
    fn describe(&self, item: &Self::Item) -> String;
}
