//! Integration tests for sav-relay API endpoints
//!
//! Tests cover:
//! - Pre-flight OPTIONS handling with permissive CORS headers
//! - POST / success and failure shapes
//! - Missing credential, malformed caller input, upstream failure
//! - Request body limit (photo-sized payloads pass, oversized ones do not)
//! - Health endpoint and unknown-route fallback
//!
//! Upstream is replaced by an in-process stub transport, so no network
//! access is needed.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use sav_relay::{build_router, AppState};
use sav_valuation::inference::InferenceRequest;
use sav_valuation::{
    InferenceTransport, RequestBuilder, RetryPolicy, TransportFault, TransportResponse,
    ValuationClient,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method

/// Test helper: upstream stub that always returns the same response
struct StubUpstream {
    response: Result<TransportResponse, TransportFault>,
    calls: AtomicU32,
}

#[async_trait]
impl InferenceTransport for StubUpstream {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn send(&self, _request: &InferenceRequest) -> Result<TransportResponse, TransportFault> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }
}

/// Test helper: relay app backed by a stub upstream (minimal variant, no retry)
fn setup_app(response: Result<TransportResponse, TransportFault>) -> (axum::Router, Arc<StubUpstream>) {
    let (state, upstream) = setup_state(response);
    (build_router(state), upstream)
}

fn setup_state(response: Result<TransportResponse, TransportFault>) -> (AppState, Arc<StubUpstream>) {
    let upstream = Arc::new(StubUpstream {
        response,
        calls: AtomicU32::new(0),
    });
    let client = ValuationClient::new(
        upstream.clone(),
        RequestBuilder::new("gpt-4o"),
        RetryPolicy::single_attempt(),
    );
    (AppState::new(Some(client)), upstream)
}

/// A JPEG data URL whose base64 part is `base64_len` bytes long
fn photo_data_url(base64_len: usize) -> String {
    format!("data:image/jpeg;base64,/9j/{}", "A".repeat(base64_len))
}

fn completion(content: &str) -> Result<TransportResponse, TransportFault> {
    let body = json!({"choices": [{"message": {"role": "assistant", "content": content}}]});
    Ok(TransportResponse::new(200, body.to_string()))
}

fn post_json(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

// =============================================================================
// CORS pre-flight
// =============================================================================

#[tokio::test]
async fn test_preflight_returns_empty_ok_with_cors_headers() {
    let (app, upstream) = setup_app(completion("{}"));

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/")
        .header(header::ORIGIN, "https://scanner.example.org")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type, authorization")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_HEADERS));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.is_empty());
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_preflight_on_any_path() {
    let (app, _) = setup_app(completion("{}"));

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/some/other/path")
        .header(header::ORIGIN, "https://scanner.example.org")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

// =============================================================================
// POST /
// =============================================================================

#[tokio::test]
async fn test_valuation_success() {
    let (app, upstream) = setup_app(completion(
        r#"{"mainItem":{"name":"Projector","estimatedValue":450},"otherObjects":[{"name":"Cart","estimatedValue":80,"confidence":0.7}]}"#,
    ));

    let response = app
        .oneshot(post_json(json!({"imageDataUrl": "data:image/jpeg;base64,/9j/4AAQ"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let body = extract_json(response.into_body()).await;
    assert_eq!(
        body,
        json!({
            "itemName": "Projector",
            "estimatedValue": 450.0,
            "detectedObjects": [{"name": "Cart", "estimatedValue": 80.0, "confidence": 0.7}]
        })
    );
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_photo_sized_payload_is_forwarded() {
    let (app, upstream) = setup_app(completion(
        r#"{"mainItem":{"name":"Projector","estimatedValue":450}}"#,
    ));

    // A phone photo base64-encodes to several MB, well past axum's 2 MB default
    let response = app
        .oneshot(post_json(json!({"imageDataUrl": photo_data_url(8 * 1024 * 1024)})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["itemName"], "Projector");
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_body_over_configured_limit_is_rejected() {
    let (state, upstream) = setup_state(completion("{}"));
    let app = build_router(state.with_max_body_bytes(1024));

    let response = app
        .oneshot(post_json(json!({"imageDataUrl": photo_data_url(4096)})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = extract_json(response.into_body()).await;
    assert!(body["error"].as_str().unwrap().contains("Invalid request body"));
    assert_eq!(body["kind"], "InvalidRequest");
    assert_eq!(body["retryable"], false);
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_credential_returns_500() {
    let app = build_router(AppState::new(None));

    let response = app
        .oneshot(post_json(json!({"imageDataUrl": "data:image/png;base64,AAAA"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = extract_json(response.into_body()).await;
    assert!(body["error"].as_str().unwrap().contains("not configured"));
    assert_eq!(body["kind"], "Config");
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn test_malformed_body_returns_500() {
    let (app, upstream) = setup_app(completion("{}"));

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = extract_json(response.into_body()).await;
    assert!(body["error"].is_string());
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_image_field_returns_500() {
    let (app, upstream) = setup_app(completion("{}"));

    let response = app
        .oneshot(post_json(json!({"image": "data:image/png;base64,AAAA"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = extract_json(response.into_body()).await;
    assert!(body["error"].as_str().unwrap().contains("Invalid request body"));
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_image_returns_500_without_upstream_call() {
    let (app, upstream) = setup_app(completion("{}"));

    let response = app
        .oneshot(post_json(json!({"imageDataUrl": ""})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Image payload is empty");
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_upstream_client_error_is_relayed_as_500() {
    let (app, upstream) = setup_app(Ok(TransportResponse::new(
        401,
        r#"{"error":{"message":"Incorrect API key provided"}}"#,
    )));

    let response = app
        .oneshot(post_json(json!({"imageDataUrl": "data:image/png;base64,AAAA"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = extract_json(response.into_body()).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Incorrect API key provided"));
    assert_eq!(body["kind"], "UpstreamClientError");
    assert_eq!(body["upstreamStatus"], 401);
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_upstream_server_error_not_retried_by_relay() {
    let (app, upstream) = setup_app(Ok(TransportResponse::new(503, "Service Unavailable")));

    let response = app
        .oneshot(post_json(json!({"imageDataUrl": "data:image/png;base64,AAAA"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["kind"], "ExhaustedRetries");
    assert_eq!(body["retryable"], true);
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_malformed_upstream_response_returns_500() {
    let (app, _) = setup_app(completion("I think this is a projector worth about $450."));

    let response = app
        .oneshot(post_json(json!({"imageDataUrl": "data:image/png;base64,AAAA"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = extract_json(response.into_body()).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Malformed upstream response"));
    assert_eq!(body["kind"], "MalformedUpstreamResponse");
    assert_eq!(body["retryable"], false);
}

// =============================================================================
// Health and fallback
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = setup_app(completion("{}"));

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "sav-relay");
    assert!(body["version"].is_string());
    assert_eq!(body["upstream_configured"], true);
}

#[tokio::test]
async fn test_health_reports_missing_credential() {
    let app = build_router(AppState::new(None));

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["upstream_configured"], false);
}

#[tokio::test]
async fn test_unknown_route_returns_404_json() {
    let (app, _) = setup_app(completion("{}"));

    let request = Request::builder()
        .method("GET")
        .uri("/nope")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Not found");
}
