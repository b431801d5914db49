use std::time::Duration;

use cadence_core::error::{AppError, TransportError};
use cadence_core::traits::{HttpRequest, HttpResponse, Method, Transport};
use reqwest::Client;

/// Connect timeout for the shared client. Per-request deadlines come from
/// [`HttpRequest::timeout`].
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP transport using reqwest.
///
/// Sends exactly one request per call and hands back status and body
/// unchanged; retry and throttling live in the executor.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

fn map_error(e: reqwest::Error, timeout: Duration) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(timeout.as_secs())
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
        };

        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_error(e, request.timeout))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| map_error(e, request.timeout))?;

        tracing::trace!(url = %request.url, status, bytes = body.len(), "Response received");
        Ok(HttpResponse { status, body })
    }
}
