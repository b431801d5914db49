//! Token-bucket throttling for outbound catalog requests.
//!
//! A [`RateLimiter`] gates every logical request issued by one
//! [`RequestExecutor`](crate::executor::RequestExecutor). It also tracks how
//! many 429 responses arrived in a row. When that streak grows past the
//! configured threshold on the first attempt of a call, the bucket is swapped
//! for a slower one and stays that way for the rest of the process.
//!
//! ```text
//! NORMAL (1s refill, burst 1) --[> threshold consecutive 429s]--> CONSERVATIVE (2s, burst 1)
//! ```

use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use governor::Quota;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use tokio_util::sync::CancellationToken;

use crate::error::AppError;

type Bucket = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Refill cadence and burst size of one token bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Time to replenish a single token.
    pub refill_interval: Duration,

    /// Maximum number of tokens available at once.
    pub burst: u32,
}

impl RateLimitConfig {
    pub fn new(refill_interval: Duration, burst: u32) -> Self {
        Self {
            refill_interval,
            burst,
        }
    }

    fn quota(&self) -> Result<Quota, AppError> {
        let burst = NonZeroU32::new(self.burst)
            .ok_or_else(|| AppError::ConfigError("rate limit burst must be at least 1".into()))?;
        let quota = Quota::with_period(self.refill_interval).ok_or_else(|| {
            AppError::ConfigError("rate limit refill interval must be non-zero".into())
        })?;
        Ok(quota.allow_burst(burst))
    }
}

/// Configuration for the throttle and its overload downgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Bucket used until sustained overload is detected.
    pub normal: RateLimitConfig,

    /// Bucket swapped in permanently after overload.
    pub conservative: RateLimitConfig,

    /// Consecutive 429 count that must be exceeded to trigger the downgrade.
    pub overload_threshold: u32,
}

/// MusicBrainz allows one request per second per client.
impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            normal: RateLimitConfig::new(Duration::from_secs(1), 1),
            conservative: RateLimitConfig::new(Duration::from_secs(2), 1),
            overload_threshold: 10,
        }
    }
}

/// Mutable limiter state, only ever touched under one mutex.
struct LimiterState {
    bucket: Arc<Bucket>,
    active: RateLimitConfig,
    consecutive_rate_limits: u32,
    downgraded: bool,
}

/// Token bucket plus overload tracking for a single executor.
pub struct RateLimiter {
    config: ThrottleConfig,
    state: Mutex<LimiterState>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("RateLimiter")
            .field("active", &state.active)
            .field("consecutive_rate_limits", &state.consecutive_rate_limits)
            .field("downgraded", &state.downgraded)
            .finish()
    }
}

impl RateLimiter {
    pub fn new(config: ThrottleConfig) -> Result<Self, AppError> {
        // Validate both buckets up front so the downgrade can never fail later.
        config.conservative.quota()?;
        let bucket = Bucket::direct(config.normal.quota()?);
        Ok(Self {
            config,
            state: Mutex::new(LimiterState {
                bucket: Arc::new(bucket),
                active: config.normal,
                consecutive_rate_limits: 0,
                downgraded: false,
            }),
        })
    }

    /// Acquires the state lock, recovering from poison if necessary.
    fn lock_state(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned rate limiter mutex");
            poisoned.into_inner()
        })
    }

    /// Wait for a token, or fail with [`AppError::Cancelled`] if `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), AppError> {
        // Clone the bucket out so the lock is not held across the wait.
        let bucket = Arc::clone(&self.lock_state().bucket);
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(AppError::Cancelled),
            () = bucket.until_ready() => Ok(()),
        }
    }

    /// Record a 429 response.
    ///
    /// Returns the new configuration if this observation triggered the
    /// permanent downgrade. That happens at most once per limiter.
    pub fn record_rate_limited(&self, first_attempt: bool) -> Option<RateLimitConfig> {
        let mut state = self.lock_state();
        state.consecutive_rate_limits = state.consecutive_rate_limits.saturating_add(1);

        if !first_attempt
            || state.downgraded
            || state.consecutive_rate_limits <= self.config.overload_threshold
        {
            return None;
        }

        let conservative = self.config.conservative;
        match conservative.quota() {
            Ok(quota) => {
                state.bucket = Arc::new(Bucket::direct(quota));
                state.active = conservative;
                state.downgraded = true;
                Some(conservative)
            }
            Err(e) => {
                tracing::error!(error = %e, "Could not build conservative rate limit bucket");
                None
            }
        }
    }

    /// Record a non-rate-limited response, ending any 429 streak.
    pub fn record_success(&self) {
        self.lock_state().consecutive_rate_limits = 0;
    }

    pub fn consecutive_rate_limits(&self) -> u32 {
        self.lock_state().consecutive_rate_limits
    }

    pub fn is_downgraded(&self) -> bool {
        self.lock_state().downgraded
    }

    /// The bucket configuration currently in force.
    pub fn active_config(&self) -> RateLimitConfig {
        self.lock_state().active
    }
}
