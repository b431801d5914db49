use std::time::Duration;

use cadence_client::ReqwestTransport;
use cadence_core::{HttpRequest, Method, TransportError, Transport};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn get(url: String, timeout: Duration) -> HttpRequest {
    HttpRequest {
        method: Method::Get,
        url,
        headers: vec![
            ("User-Agent".to_string(), "cadence-integration/0.0".to_string()),
            ("Accept".to_string(), "application/json".to_string()),
        ],
        timeout,
    }
}

#[tokio::test]
async fn send_returns_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ws/2/release/abc"))
        .and(header("User-Agent", "cadence-integration/0.0"))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":"abc"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new().unwrap();
    let response = transport
        .send(&get(
            format!("{}/ws/2/release/abc", server.uri()),
            Duration::from_secs(5),
        ))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, r#"{"id":"abc"}"#);
}

#[tokio::test]
async fn error_statuses_are_responses_not_errors() {
    let server = MockServer::start().await;
    Mock::given(path("/limited"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new().unwrap();
    let response = transport
        .send(&get(format!("{}/limited", server.uri()), Duration::from_secs(5)))
        .await
        .unwrap();

    assert_eq!(response.status, 429);
    assert_eq!(response.body, "slow down");
}

#[tokio::test]
async fn slow_response_maps_to_timeout() {
    let server = MockServer::start().await;
    Mock::given(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let transport = ReqwestTransport::new().unwrap();
    let err = transport
        .send(&get(format!("{}/slow", server.uri()), Duration::from_secs(1)))
        .await
        .unwrap_err();

    assert_eq!(err, TransportError::Timeout(1));
}

#[tokio::test]
async fn refused_connection_maps_to_connect() {
    let transport = ReqwestTransport::new().unwrap();
    let err = transport
        .send(&get("http://127.0.0.1:1/".to_string(), Duration::from_secs(5)))
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Connect(_)), "{err:?}");
}
