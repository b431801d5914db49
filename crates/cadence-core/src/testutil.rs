//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` or atomics for interior mutability, so a
//! clone handed to the code under test shares what the test inspects.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::backoff::BackoffPolicy;
use crate::error::{AppError, TransportError};
use crate::executor::{
    ExecutorConfig, ExecutorEvent, ExecutorReporter, OVERLOADED_STATUS, RATE_LIMIT_STATUS,
};
use crate::models::{Medium, Release, ReleaseGroup, ReleaseGroupSlot, ReleaseKind};
use crate::throttle::{RateLimitConfig, ThrottleConfig};
use crate::traits::{DetailFetcher, HttpRequest, HttpResponse, Transport};

type MockResult = Result<HttpResponse, TransportError>;

// ---------------------------------------------------------------------------
// MockTransport
// ---------------------------------------------------------------------------

/// Mock transport that records requests and replays configured responses.
///
/// Routes (URL fragment to response) are checked first and never consumed.
/// Otherwise each call pops the next queued response; an empty queue
/// answers `200 {}`.
#[derive(Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<VecDeque<MockResult>>>,
    routes: Arc<Mutex<Vec<(String, MockResult)>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl MockTransport {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: Vec<MockResult>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            ..Self::default()
        }
    }

    /// Answer every request whose URL contains `fragment` with `response`.
    pub fn route(self, fragment: &str, response: MockResult) -> Self {
        self.routes
            .lock()
            .unwrap()
            .push((fragment.to_string(), response));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Transport for MockTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());

        let routed = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .find(|(fragment, _)| request.url.contains(fragment.as_str()))
            .map(|(_, response)| response.clone());
        if let Some(response) = routed {
            return response;
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(HttpResponse::new(200, "{}")))
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Executor reporter that records every event.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<ExecutorEvent>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ExecutorEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ExecutorReporter for RecordingReporter {
    fn report(&self, event: ExecutorEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// ---------------------------------------------------------------------------
// MockDetailFetcher
// ---------------------------------------------------------------------------

/// Detail fetcher over [`ReleaseGroupSlot`]s that tracks concurrency.
///
/// Every lookup sleeps briefly so overlapping workers are observable.
/// Slots whose id was passed to [`failing_on`](Self::failing_on) fail with
/// a connect error.
#[derive(Clone)]
pub struct MockDetailFetcher {
    failing: Vec<String>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl MockDetailFetcher {
    pub fn new() -> Self {
        Self {
            failing: Vec::new(),
            delay: Duration::from_millis(10),
            calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_on(mut self, id: &str) -> Self {
        self.failing.push(id.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl DetailFetcher for MockDetailFetcher {
    type Item = ReleaseGroupSlot;
    type Detail = ReleaseGroup;

    async fn fetch(
        &self,
        item: &ReleaseGroupSlot,
        _cancel: &CancellationToken,
    ) -> Result<ReleaseGroup, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&item.id) {
            return Err(TransportError::Connect("mock failure".into()).into());
        }
        Ok(ReleaseGroup {
            id: item.id.clone(),
            title: item.title.clone(),
            primary_type: Some("Album".into()),
            secondary_types: Vec::new(),
            first_release_date: Some("1978-11-10".into()),
            releases: Vec::new(),
        })
    }

    fn apply(&self, item: &mut ReleaseGroupSlot, detail: ReleaseGroup) {
        item.kind = Some(ReleaseKind::from_types(
            detail.primary_type.as_deref(),
            &detail.secondary_types,
        ));
        item.primary_type = detail.primary_type;
        item.secondary_types = detail.secondary_types;
        item.first_release_date = detail.first_release_date;
    }

    fn fallback(&self, item: &mut ReleaseGroupSlot) {
        item.kind = Some(ReleaseKind::from_track_count(item.track_count));
    }

    fn describe(&self, item: &ReleaseGroupSlot) -> String {
        item.title.clone()
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Executor config with millisecond backoff and generous buckets.
pub fn fast_executor_config() -> ExecutorConfig {
    ExecutorConfig {
        base_url: "http://catalog.test/ws/2/".to_string(),
        user_agent: "cadence-tests/0.0".to_string(),
        timeout: Duration::from_secs(5),
        max_attempts: 5,
        backoff: BackoffPolicy::new(Duration::from_millis(10), Duration::from_secs(10)),
        throttle: ThrottleConfig {
            normal: RateLimitConfig::new(Duration::from_millis(1), 100),
            conservative: RateLimitConfig::new(Duration::from_millis(5), 1),
            overload_threshold: 10,
        },
        rate_limit_statuses: vec![RATE_LIMIT_STATUS, OVERLOADED_STATUS],
    }
}

/// Minimal release with one medium per format.
pub fn release(id: &str, title: &str, date: Option<&str>, formats: &[&str]) -> Release {
    Release {
        id: id.to_string(),
        title: title.to_string(),
        date: date.map(str::to_string),
        status: None,
        country: None,
        barcode: None,
        artist_credit: Vec::new(),
        media: formats
            .iter()
            .map(|f| Medium {
                format: Some(f.to_string()),
                ..Medium::default()
            })
            .collect(),
        track_count: None,
        release_group: None,
        score: None,
    }
}

/// JSON body of a release search page.
pub fn release_search_body(releases: &[Release]) -> String {
    let releases: Vec<serde_json::Value> = releases
        .iter()
        .map(|r| serde_json::to_value(r).unwrap())
        .collect();
    serde_json::json!({
        "count": releases.len(),
        "offset": 0,
        "releases": releases,
    })
    .to_string()
}
