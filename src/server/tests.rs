use super::ws::handle_client_frame;
use super::*;
use crate::pairing::Broadcaster;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tower::ServiceExt;
use waylink_core::error::WaylinkError;
use waylink_core::event::{TransportEvent, WireEvent};
use waylink_core::state::ConnectionState;
use waylink_core::traits::{SessionStore, Transport};

/// Transport that accepts every establish call and never emits events.
struct IdleTransport;

#[async_trait]
impl Transport for IdleTransport {
    async fn establish(
        &self,
        _pairing_phone: Option<String>,
    ) -> Result<mpsc::Receiver<TransportEvent>, WaylinkError> {
        let (tx, rx) = mpsc::channel(1);
        // Keep the sender alive so the pump blocks instead of synthesizing
        // a close for an ended stream.
        std::mem::forget(tx);
        Ok(rx)
    }
}

struct NullStore;

#[async_trait]
impl SessionStore for NullStore {
    async fn load(&self) -> Result<Option<Vec<u8>>, WaylinkError> {
        Ok(None)
    }
    async fn save(&self, _credentials: &[u8]) -> Result<(), WaylinkError> {
        Ok(())
    }
    async fn wipe(&self) -> Result<(), WaylinkError> {
        Ok(())
    }
}

fn test_coordinator() -> Arc<Coordinator> {
    Coordinator::new(
        Arc::new(IdleTransport),
        Arc::new(NullStore),
        Arc::new(Broadcaster::new()),
        Duration::from_secs(60),
    )
}

fn test_router(public_dir: &Path) -> Router {
    build_router(ServerState::new(test_coordinator()), public_dir)
}

async fn body_json(resp: axum::http::Response<Body>) -> Value {
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_reports_connection_state() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_router(dir.path());

    let req = Request::get("/api/health").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["connection"], "idle");
}

#[tokio::test]
async fn test_static_pairing_page_is_served() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<html>pair here</html>").unwrap();
    let app = test_router(dir.path());

    let req = Request::get("/").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert!(std::str::from_utf8(&body).unwrap().contains("pair here"));
}

#[tokio::test]
async fn test_ws_route_requires_upgrade() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_router(dir.path());

    let req = Request::get("/ws").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert!(resp.status().is_client_error());
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_router(dir.path());

    let req = Request::get("/no-such-page").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_client_frame_rejects_non_digit_input() {
    let coordinator = test_coordinator();

    let reply = handle_client_frame(
        &coordinator,
        r#"{"type":"phoneNumberInput","number":"+1 555"}"#,
    )
    .await;
    assert_eq!(
        reply,
        Some(WireEvent::error("Invalid phone number format."))
    );
    // Rejected input never touches the state machine.
    assert_eq!(coordinator.snapshot().await.state, ConnectionState::Idle);
}

#[tokio::test]
async fn test_client_frame_starts_pairing() {
    let coordinator = test_coordinator();

    let reply = handle_client_frame(
        &coordinator,
        r#"{"type":"phoneNumberInput","number":"15551234567"}"#,
    )
    .await;
    assert_eq!(reply, None);
    assert_eq!(
        coordinator.snapshot().await.state,
        ConnectionState::Connecting
    );
}

#[tokio::test]
async fn test_client_frame_reports_busy_to_sender_only() {
    let coordinator = test_coordinator();
    let frame = r#"{"type":"phoneNumberInput","number":"15551234567"}"#;

    assert_eq!(handle_client_frame(&coordinator, frame).await, None);
    let reply = handle_client_frame(&coordinator, frame).await;
    assert_eq!(
        reply,
        Some(WireEvent::status("Bot is already connecting or connected."))
    );
}

#[tokio::test]
async fn test_unparseable_frame_is_ignored() {
    let coordinator = test_coordinator();
    assert_eq!(handle_client_frame(&coordinator, "not json").await, None);
    assert_eq!(
        handle_client_frame(&coordinator, r#"{"type":"unknown"}"#).await,
        None
    );
}
