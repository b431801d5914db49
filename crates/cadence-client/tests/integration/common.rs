use std::time::Duration;

use cadence_core::{BackoffPolicy, ExecutorConfig, RateLimitConfig, ThrottleConfig};
use wiremock::MockServer;

/// Executor config pointed at a mock server, with millisecond backoff.
pub fn executor_config(server: &MockServer) -> ExecutorConfig {
    ExecutorConfig {
        base_url: format!("{}/ws/2/", server.uri()),
        user_agent: "cadence-integration/0.0".to_string(),
        timeout: Duration::from_secs(5),
        max_attempts: 4,
        backoff: BackoffPolicy::new(Duration::from_millis(5), Duration::from_millis(50)),
        throttle: ThrottleConfig {
            normal: RateLimitConfig::new(Duration::from_millis(1), 50),
            conservative: RateLimitConfig::new(Duration::from_millis(10), 1),
            overload_threshold: 10,
        },
        rate_limit_statuses: vec![429, 503],
    }
}

pub fn release_json(id: &str, title: &str, format: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "title": title,
        "media": [{"format": format}],
    })
}
