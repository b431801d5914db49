use thiserror::Error;

/// Transport-level failure, independent of the HTTP library in use.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request did not complete before its deadline.
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// The connection could not be established or was reset.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other failure while sending or reading the response.
    #[error("transport error: {0}")]
    Other(String),
}

/// Application-wide error types for Cadence.
#[derive(Error, Debug)]
pub enum AppError {
    /// Non-success HTTP status other than 429. Never retried.
    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// A single transport failure (before retry bookkeeping).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Every attempt failed and the last failure was a transport error.
    #[error("request failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: TransportError },

    /// Every attempt was answered with 429.
    #[error(
        "exceeded rate limit after {attempts} attempts, consider lowering parallelism"
    )]
    RateLimitExhausted { attempts: u32 },

    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// Response body did not match the expected schema.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A search returned no candidates at all.
    #[error("no candidates found for {0}")]
    NoCandidates(String),

    /// A request target could not be turned into a URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// Returns true if the terminal cause was rate limiting.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, AppError::RateLimitExhausted { .. })
    }
}
