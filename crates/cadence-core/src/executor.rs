//! Rate-limited, retrying request executor.
//!
//! One [`RequestExecutor::execute`] call is one logical request:
//!
//! 1. take a token from the [`RateLimiter`] (cancellable),
//! 2. resolve the [`RequestDescriptor`] against the base URL,
//! 3. run up to `max_attempts` attempts, feeding each result through
//!    [`classify`] and acting on the [`RetryOutcome`].
//!
//! Transport failures back off with a plain sleep. Rate-limit responses (429,
//! plus any other status listed in [`ExecutorConfig::rate_limit_statuses`])
//! back off with a sleep that observes cancellation, and the delay is scaled
//! by the streak length once three or more arrive in a row.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::backoff::BackoffPolicy;
use crate::error::{AppError, TransportError};
use crate::throttle::{RateLimitConfig, RateLimiter, ThrottleConfig};
use crate::traits::{HttpRequest, HttpResponse, Method, Transport};

/// HTTP status signalling the caller is being throttled.
pub const RATE_LIMIT_STATUS: u16 = 429;

/// MusicBrainz answers over-quota clients with 503 instead of 429.
pub const OVERLOADED_STATUS: u16 = 503;

/// Streak length from which 429 backoff delays get multiplied.
const STREAK_MULTIPLIER_FROM: u32 = 3;

const DEFAULT_USER_AGENT: &str = concat!("cadence/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Request description
// ---------------------------------------------------------------------------

/// What to request: a path relative to the base URL, or an absolute URL,
/// plus ordered query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    target: String,
    absolute: bool,
    query: Vec<(String, String)>,
}

impl RequestDescriptor {
    /// Target resolved against the executor's base URL.
    pub fn relative(path: impl Into<String>) -> Self {
        Self {
            target: path.into(),
            absolute: false,
            query: Vec::new(),
        }
    }

    /// Target used verbatim.
    pub fn absolute(url: impl Into<String>) -> Self {
        Self {
            target: url.into(),
            absolute: true,
            query: Vec::new(),
        }
    }

    /// Append a query parameter. Order is preserved.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// Build the final URL.
    pub fn resolve(&self, base: &Url) -> Result<Url, AppError> {
        let mut url = if self.absolute {
            Url::parse(&self.target)
        } else {
            base.join(self.target.trim_start_matches('/'))
        }
        .map_err(|e| AppError::InvalidUrl(format!("{}: {e}", self.target)))?;

        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }
        Ok(url)
    }
}

// ---------------------------------------------------------------------------
// Attempt classification
// ---------------------------------------------------------------------------

/// Why an attempt did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Transport(TransportError),
    RateLimited,
    Status(u16),
}

/// Result of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    Success(String),
    Retryable(FailureReason),
    Fatal(FailureReason),
}

/// Map one transport result onto the retry decision.
///
/// `rate_limit_statuses` lists the statuses treated like a 429.
pub fn classify(
    result: Result<HttpResponse, TransportError>,
    rate_limit_statuses: &[u16],
) -> RetryOutcome {
    match result {
        Err(e) => RetryOutcome::Retryable(FailureReason::Transport(e)),
        Ok(response) if response.is_success() => RetryOutcome::Success(response.body),
        Ok(response) if rate_limit_statuses.contains(&response.status) => {
            RetryOutcome::Retryable(FailureReason::RateLimited)
        }
        Ok(response) => RetryOutcome::Fatal(FailureReason::Status(response.status)),
    }
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

/// Events emitted by the executor for logging/UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorEvent {
    /// A transport error will be retried after `delay`.
    TransportRetry {
        url: String,
        attempt: u32,
        delay: Duration,
        error: TransportError,
    },
    /// A 429 was received. `delay` is `None` when no attempts remain.
    RateLimited {
        url: String,
        attempt: u32,
        consecutive: u32,
        delay: Option<Duration>,
    },
    /// The limiter was permanently switched to its conservative bucket.
    Downgraded { config: RateLimitConfig },
}

/// Trait for receiving executor events (decoupled logging).
pub trait ExecutorReporter: Send + Sync {
    fn report(&self, event: ExecutorEvent) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ExecutorReporter for TracingReporter {
    fn report(&self, event: ExecutorEvent) {
        match event {
            ExecutorEvent::TransportRetry {
                url,
                attempt,
                delay,
                error,
            } => {
                tracing::warn!(
                    %url,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    %error,
                    "Request failed, retrying"
                );
            }
            ExecutorEvent::RateLimited {
                url,
                attempt,
                consecutive,
                delay,
            } => match delay {
                Some(delay) => tracing::warn!(
                    %url,
                    attempt = attempt + 1,
                    consecutive,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, backing off"
                ),
                None => tracing::warn!(
                    %url,
                    attempt = attempt + 1,
                    consecutive,
                    "Rate limited on final attempt"
                ),
            },
            ExecutorEvent::Downgraded { config } => {
                tracing::warn!(
                    refill_ms = config.refill_interval.as_millis() as u64,
                    burst = config.burst,
                    "Catalog keeps rate limiting; switched to a conservative request rate for the rest of this run"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Configuration for a [`RequestExecutor`].
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Base for relative descriptors. A trailing `/` is added if missing.
    pub base_url: String,
    pub user_agent: String,
    /// Per-attempt deadline.
    pub timeout: Duration,
    /// Total attempts per logical request, including the first.
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
    pub throttle: ThrottleConfig,
    /// Statuses handled as rate limiting. Any other non-2xx is fatal.
    pub rate_limit_statuses: Vec<u16>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://musicbrainz.org/ws/2/".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            max_attempts: 5,
            backoff: BackoffPolicy::default(),
            throttle: ThrottleConfig::default(),
            rate_limit_statuses: vec![RATE_LIMIT_STATUS, OVERLOADED_STATUS],
        }
    }
}

/// Issues logical requests through a rate limiter with classified retry.
///
/// Clones share the same limiter, so a cloned executor is the same executor
/// as far as throttling and overload tracking are concerned.
#[derive(Clone)]
pub struct RequestExecutor<T> {
    transport: T,
    base_url: Url,
    config: Arc<ExecutorConfig>,
    limiter: Arc<RateLimiter>,
    reporter: Arc<dyn ExecutorReporter>,
}

impl<T: Transport> RequestExecutor<T> {
    pub fn new(transport: T, config: ExecutorConfig) -> Result<Self, AppError> {
        let limiter = RateLimiter::new(config.throttle)?;
        Self::with_rate_limiter(transport, config, limiter)
    }

    /// Build an executor around an existing limiter.
    pub fn with_rate_limiter(
        transport: T,
        config: ExecutorConfig,
        limiter: RateLimiter,
    ) -> Result<Self, AppError> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url =
            Url::parse(&base).map_err(|e| AppError::InvalidUrl(format!("{base}: {e}")))?;

        Ok(Self {
            transport,
            base_url,
            config: Arc::new(config),
            limiter: Arc::new(limiter),
            reporter: Arc::new(TracingReporter),
        })
    }

    pub fn with_reporter(mut self, reporter: impl ExecutorReporter + 'static) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn build_request(&self, url: &Url) -> HttpRequest {
        HttpRequest {
            method: Method::Get,
            url: url.to_string(),
            headers: vec![
                ("User-Agent".to_string(), self.config.user_agent.clone()),
                ("Accept".to_string(), "application/json".to_string()),
            ],
            timeout: self.config.timeout,
        }
    }

    /// Execute one logical request and return the response body.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        descriptor: &RequestDescriptor,
    ) -> Result<String, AppError> {
        self.limiter.acquire(cancel).await?;

        let url = descriptor.resolve(&self.base_url)?;
        let request = self.build_request(&url);
        let backoff = self.config.backoff;
        let max_attempts = self.config.max_attempts.max(1);
        let mut consecutive_rate_limits = 0u32;

        for attempt in 0..max_attempts {
            let is_last = attempt + 1 == max_attempts;
            tracing::debug!(url = %request.url, attempt = attempt + 1, "Sending request");

            let result = self.transport.send(&request).await;
            match classify(result, &self.config.rate_limit_statuses) {
                RetryOutcome::Success(body) => {
                    self.limiter.record_success();
                    return Ok(body);
                }
                RetryOutcome::Fatal(reason) => {
                    return Err(fatal_error(reason, &request.url));
                }
                RetryOutcome::Retryable(FailureReason::Transport(error)) => {
                    consecutive_rate_limits = 0;
                    if is_last {
                        return Err(AppError::RetriesExhausted {
                            attempts: max_attempts,
                            last: error,
                        });
                    }
                    let delay = backoff.jittered(backoff.delay(attempt));
                    self.reporter.report(ExecutorEvent::TransportRetry {
                        url: request.url.clone(),
                        attempt,
                        delay,
                        error,
                    });
                    // Does not observe cancellation.
                    tokio::time::sleep(delay).await;
                }
                RetryOutcome::Retryable(_) => {
                    consecutive_rate_limits += 1;
                    if let Some(config) = self.limiter.record_rate_limited(attempt == 0) {
                        self.reporter.report(ExecutorEvent::Downgraded { config });
                    }

                    if is_last {
                        self.reporter.report(ExecutorEvent::RateLimited {
                            url: request.url.clone(),
                            attempt,
                            consecutive: consecutive_rate_limits,
                            delay: None,
                        });
                        break;
                    }

                    let mut delay = backoff.delay(attempt);
                    if consecutive_rate_limits >= STREAK_MULTIPLIER_FROM {
                        delay = backoff.cap(delay.saturating_mul(consecutive_rate_limits));
                    }
                    let delay = backoff.jittered(delay);
                    self.reporter.report(ExecutorEvent::RateLimited {
                        url: request.url.clone(),
                        attempt,
                        consecutive: consecutive_rate_limits,
                        delay: Some(delay),
                    });

                    tokio::select! {
                        () = cancel.cancelled() => return Err(AppError::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        // Success, fatal statuses and final transport errors return from the
        // loop; only a 429 on the last attempt falls through.
        Err(AppError::RateLimitExhausted {
            attempts: max_attempts,
        })
    }

    /// Execute and decode the body as JSON.
    pub async fn execute_json<R: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        descriptor: &RequestDescriptor,
    ) -> Result<R, AppError> {
        let body = self.execute(cancel, descriptor).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

fn fatal_error(reason: FailureReason, url: &str) -> AppError {
    match reason {
        FailureReason::Status(status) => AppError::HttpStatus {
            status,
            url: url.to_string(),
        },
        FailureReason::Transport(e) => AppError::Transport(e),
        FailureReason::RateLimited => AppError::RateLimitExhausted { attempts: 1 },
    }
}
