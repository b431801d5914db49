use std::str::FromStr;
use std::time::Duration;

use crate::backoff::BackoffPolicy;
use crate::enrich::clamp_parallelism;
use crate::error::AppError;
use crate::executor::ExecutorConfig;

/// Runtime settings for talking to the catalog.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub executor: ExecutorConfig,
    /// Enrichment worker count, already clamped to `[1, 10]`.
    pub parallelism: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            parallelism: clamp_parallelism(0),
        }
    }
}

impl CatalogConfig {
    /// Read configuration from environment variables.
    ///
    /// - `CADENCE_BASE_URL` (defaults to `https://musicbrainz.org/ws/2/`)
    /// - `CADENCE_USER_AGENT` (defaults to `cadence/<version>`)
    /// - `CADENCE_MAX_ATTEMPTS` (defaults to 5, at least 1)
    /// - `CADENCE_PARALLELISM` (defaults to 5, clamped to 1..=10)
    /// - `CADENCE_TIMEOUT_SECS` (defaults to 30, at least 1)
    /// - `CADENCE_BACKOFF_BASE_MS` (defaults to 1000)
    /// - `CADENCE_BACKOFF_MAX_MS` (defaults to 60000, not below the base)
    /// - `CADENCE_RATE_LIMIT_STATUSES` (comma-separated, defaults to `429,503`)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable lookup.
    pub fn from_source<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ExecutorConfig::default();

        let base_url = lookup("CADENCE_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.base_url);
        url::Url::parse(&base_url).map_err(|e| {
            AppError::ConfigError(format!("Invalid CADENCE_BASE_URL '{base_url}': {e}"))
        })?;

        let user_agent = lookup("CADENCE_USER_AGENT")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.user_agent);

        let max_attempts: u32 = parse_var(&lookup, "CADENCE_MAX_ATTEMPTS", defaults.max_attempts)?;
        if max_attempts == 0 {
            return Err(AppError::ConfigError(
                "CADENCE_MAX_ATTEMPTS must be at least 1".into(),
            ));
        }

        let parallelism: usize = parse_var(&lookup, "CADENCE_PARALLELISM", 0)?;

        let timeout_secs: u64 =
            parse_var(&lookup, "CADENCE_TIMEOUT_SECS", defaults.timeout.as_secs())?;
        if timeout_secs == 0 {
            return Err(AppError::ConfigError(
                "CADENCE_TIMEOUT_SECS must be at least 1".into(),
            ));
        }

        let base_ms: u64 = parse_var(
            &lookup,
            "CADENCE_BACKOFF_BASE_MS",
            defaults.backoff.base.as_millis() as u64,
        )?;
        let max_ms: u64 = parse_var(
            &lookup,
            "CADENCE_BACKOFF_MAX_MS",
            defaults.backoff.max_delay.as_millis() as u64,
        )?;
        if max_ms < base_ms {
            return Err(AppError::ConfigError(format!(
                "CADENCE_BACKOFF_MAX_MS ({max_ms}) must not be below CADENCE_BACKOFF_BASE_MS ({base_ms})"
            )));
        }

        let rate_limit_statuses = match lookup("CADENCE_RATE_LIMIT_STATUSES") {
            None => defaults.rate_limit_statuses,
            Some(raw) => parse_statuses(&raw)?,
        };

        Ok(Self {
            executor: ExecutorConfig {
                base_url,
                user_agent,
                timeout: Duration::from_secs(timeout_secs),
                max_attempts,
                backoff: BackoffPolicy::new(
                    Duration::from_millis(base_ms),
                    Duration::from_millis(max_ms),
                ),
                throttle: defaults.throttle,
                rate_limit_statuses,
            },
            parallelism: clamp_parallelism(parallelism),
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            AppError::ConfigError(format!(
                "Invalid {key} '{raw}': must be a non-negative integer"
            ))
        }),
    }
}

fn parse_statuses(raw: &str) -> Result<Vec<u16>, AppError> {
    let invalid = || {
        AppError::ConfigError(format!(
            "Invalid CADENCE_RATE_LIMIT_STATUSES '{raw}': expected comma-separated HTTP error statuses"
        ))
    };
    let statuses = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<u16>() {
            Ok(status) if (400..600).contains(&status) => Ok(status),
            _ => Err(invalid()),
        })
        .collect::<Result<Vec<_>, _>>()?;
    if statuses.is_empty() {
        return Err(invalid());
    }
    Ok(statuses)
}
