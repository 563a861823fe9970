//! Tests for consentsync-transport: HttpTransport against a local axum server

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use consentsync_core::*;
use consentsync_transport::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
struct Seen {
    method: String,
    content_type: Option<String>,
    body: String,
}

#[derive(Clone, Default)]
struct Recorded(Arc<Mutex<Vec<Seen>>>);

impl Recorded {
    fn push(&self, method: &str, headers: &HeaderMap, body: &[u8]) {
        self.0.lock().unwrap().push(Seen {
            method: method.into(),
            content_type: headers
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .map(String::from),
            body: String::from_utf8_lossy(body).into_owned(),
        });
    }

    fn all(&self) -> Vec<Seen> {
        self.0.lock().unwrap().clone()
    }
}

async fn fetch(State(rec): State<Recorded>, headers: HeaderMap) -> (StatusCode, String) {
    rec.push("GET", &headers, b"");
    let body = serde_json::json!({
        "user_urn": "urn:x",
        "accept_main": true,
        "accept_userdata": false,
        "testbed_access": true,
        "until": "2030-01-01"
    });
    (StatusCode::OK, body.to_string())
}

async fn submit(State(rec): State<Recorded>, headers: HeaderMap, body: Bytes) -> StatusCode {
    rec.push("PUT", &headers, &body);
    StatusCode::NO_CONTENT
}

async fn revoke(State(rec): State<Recorded>, headers: HeaderMap) -> StatusCode {
    rec.push("DELETE", &headers, b"");
    StatusCode::NO_CONTENT
}

async fn spawn_server() -> (String, Recorded) {
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/gdpr/accept", get(fetch).put(submit).delete(revoke))
        .route(
            "/broken/accept",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route(
            "/slow/accept",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        )
        .with_state(recorded.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), recorded)
}

fn transport(base: &str) -> HttpTransport {
    HttpTransport::new(base, Duration::from_secs(5)).unwrap()
}

// ===========================================================================
// Construction
// ===========================================================================

#[test]
fn http_transport_rejects_bad_base_url() {
    let err = HttpTransport::new("::not a url::", Duration::from_secs(1)).err().unwrap();
    assert!(matches!(err, HttpTransportError::InvalidBaseUrl(_)));
}

#[test]
fn http_transport_from_config() {
    let config = ServerConfig {
        base_url: "https://testbed.example.org".into(),
        ..ServerConfig::default()
    };
    let t = HttpTransport::from_config(&config).unwrap();
    assert_eq!(t.name(), "http");
    assert_eq!(t.base_url().as_str(), "https://testbed.example.org/");
}

// ===========================================================================
// Requests
// ===========================================================================

#[tokio::test]
async fn http_fetch_returns_status_and_body() {
    let (base, recorded) = spawn_server().await;
    let response = transport(&base).send(Request::fetch(GDPR_ENDPOINT)).await.unwrap();
    assert_eq!(response.status, 200);

    let record = decode_record(&response).unwrap();
    assert_eq!(record.user_urn, "urn:x");
    assert_eq!(record.valid_until, "2030-01-01");

    let seen = recorded.all();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, "GET");
    assert!(seen[0].content_type.is_none());
}

#[tokio::test]
async fn http_submit_sends_json_draft() {
    let (base, recorded) = spawn_server().await;
    let request = Request::submit(GDPR_ENDPOINT, &ConsentDraft::decline_all());
    let response = transport(&base).send(request).await.unwrap();
    assert_eq!(response.status, 204);
    assert!(Operation::Submit.check(&response).is_ok());

    let seen = recorded.all();
    assert_eq!(seen[0].method, "PUT");
    assert_eq!(seen[0].content_type.as_deref(), Some("application/json"));
    let body: serde_json::Value = serde_json::from_str(&seen[0].body).unwrap();
    assert_eq!(body, serde_json::json!({"accept_main": false, "accept_userdata": false}));
}

#[tokio::test]
async fn http_revoke_sends_delete() {
    let (base, recorded) = spawn_server().await;
    let response = transport(&base).send(Request::revoke(GDPR_ENDPOINT)).await.unwrap();
    assert_eq!(response.status, 204);
    assert_eq!(recorded.all()[0].method, "DELETE");
}

#[tokio::test]
async fn http_error_status_is_not_a_transport_error() {
    let (base, _) = spawn_server().await;
    let response = transport(&base).send(Request::fetch("/broken/accept")).await.unwrap();
    assert_eq!(response.status, 500);
    assert_eq!(&response.body[..], b"boom");
    assert!(matches!(
        decode_record(&response),
        Err(SyncError::UnexpectedStatus { status: 500, .. })
    ));
}

#[tokio::test]
async fn http_unknown_path_is_404() {
    let (base, _) = spawn_server().await;
    let response = transport(&base).send(Request::fetch("/nope")).await.unwrap();
    assert_eq!(response.status, 404);
}

// ===========================================================================
// Transport failures
// ===========================================================================

#[tokio::test]
async fn http_timeout_is_classified() {
    let (base, _) = spawn_server().await;
    let t = HttpTransport::new(&base, Duration::from_millis(200)).unwrap();
    match t.send(Request::fetch("/slow/accept")).await {
        Err(SyncError::Transport { kind, .. }) => assert_eq!(kind, TransportFailure::Timeout),
        other => panic!("Expected timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn http_refused_connection_is_classified() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let t = transport(&format!("http://127.0.0.1:{}", port));
    match t.send(Request::fetch(GDPR_ENDPOINT)).await {
        Err(SyncError::Transport { kind, .. }) => assert_eq!(kind, TransportFailure::Connect),
        other => panic!("Expected connect failure, got {:?}", other),
    }
}
