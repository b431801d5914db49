use cadence_client::ReqwestTransport;
use cadence_core::{AppError, CatalogService, RequestDescriptor, RequestExecutor, WarningKind};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::integration::common::{executor_config, release_json};

fn service(server: &MockServer) -> CatalogService<ReqwestTransport> {
    let executor =
        RequestExecutor::new(ReqwestTransport::new().unwrap(), executor_config(server)).unwrap();
    CatalogService::new(executor)
}

#[tokio::test]
async fn rate_limited_request_is_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(path("/ws/2/release/abc"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(path("/ws/2/release/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let catalog = service(&server);
    let body = catalog
        .executor()
        .execute(
            &CancellationToken::new(),
            &RequestDescriptor::relative("release/abc"),
        )
        .await
        .unwrap();

    assert_eq!(body, "{}");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    assert_eq!(catalog.executor().rate_limiter().consecutive_rate_limits(), 0);
}

#[tokio::test]
async fn persistent_rate_limiting_exhausts() {
    let server = MockServer::start().await;
    Mock::given(path("/ws/2/release/abc"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let catalog = service(&server);
    let err = catalog
        .executor()
        .execute(
            &CancellationToken::new(),
            &RequestDescriptor::relative("release/abc"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::RateLimitExhausted { attempts: 4 }));
    assert_eq!(server.received_requests().await.unwrap().len(), 4);
}

#[tokio::test]
async fn server_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(path("/ws/2/release/abc"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let catalog = service(&server);
    let err = catalog
        .lookup_release(&CancellationToken::new(), "abc")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::HttpStatus { status: 500, .. }));
}

#[tokio::test]
async fn service_unavailable_is_retried_as_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(path("/ws/2/release/abc"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(path("/ws/2/release/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(release_json("abc", "Jazz", "CD")))
        .mount(&server)
        .await;

    let catalog = service(&server);
    let release = catalog
        .lookup_release(&CancellationToken::new(), "abc")
        .await
        .unwrap();

    assert_eq!(release.id, "abc");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn find_release_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ws/2/release"))
        .and(query_param(
            "query",
            "release:\"Parachutes\" AND artist:\"Coldplay\"",
        ))
        .and(query_param("fmt", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 2,
            "offset": 0,
            "releases": [
                release_json("r1", "Greatest Hits", "CD"),
                release_json("r2", "Parachutes", "Digital Media"),
            ],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let catalog = service(&server);
    let cancel = CancellationToken::new();

    let release = catalog
        .find_release(&cancel, "Coldplay", "Parachutes", 12)
        .await
        .unwrap();
    assert_eq!(release.id, "r2");

    // Served from cache; the mock expects exactly one hit.
    let cached = catalog
        .find_release(&cancel, "Coldplay", "Parachutes", 12)
        .await
        .unwrap();
    assert_eq!(cached.id, "r2");
}

#[tokio::test]
async fn empty_search_surfaces_no_candidates_and_warns() {
    let server = MockServer::start().await;
    Mock::given(path("/ws/2/release"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"count": 0, "releases": []})),
        )
        .mount(&server)
        .await;

    let catalog = service(&server);
    let err = catalog
        .find_release(&CancellationToken::new(), "Nobody", "Nothing", 10)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NoCandidates(_)));
    let warnings = catalog.warnings().warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, WarningKind::ReleaseLookupFailed);
    assert_eq!(warnings[0].context, "Nobody - Nothing");
}
