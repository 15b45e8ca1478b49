// HTTP API tests
//
// Exercise the router in-process with scripted engines.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use speech_capture::{
    create_router, AppState, AttemptScript, CaptureConfig, EngineScript, RecognitionEvent,
    ScriptedEngineFactory,
};
use std::sync::Arc;
use tower::ServiceExt;

fn app(script: EngineScript) -> (Router, AppState) {
    let state = AppState::new(
        Arc::new(ScriptedEngineFactory::new(script)),
        CaptureConfig::default(),
    );
    (create_router(state.clone()), state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = app(EngineScript::default());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn test_capture_lifecycle() {
    let script = EngineScript::new(vec![AttemptScript::listening()
        .emit(RecognitionEvent::FinalText("başım ağrıyor".to_string()))]);
    let (app, state) = app(script);

    let (status, body) = send(&app, "POST", "/captures", Some(json!({ "capture_id": "note-1" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["capture_id"], "note-1");

    let (status, _) = send(&app, "POST", "/captures", Some(json!({ "capture_id": "note-1" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let controller = state.captures.read().await.get("note-1").cloned().unwrap();
    let mut updates = controller.subscribe();
    updates
        .wait_for(|s| s.transcript == "başım ağrıyor ")
        .await
        .unwrap();

    let (status, body) = send(&app, "GET", "/captures/note-1/transcript", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transcript"], "başım ağrıyor ");

    let (status, _) = send(&app, "POST", "/captures/note-1/stop", None).await;
    assert_eq!(status, StatusCode::OK);
    controller.wait_stopped().await;

    let (status, body) = send(&app, "GET", "/captures/note-1/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "stopped");
    assert_eq!(body["active"], false);
    assert_eq!(body["transcript"], "başım ağrıyor ");
    assert_eq!(body["last_error"], Value::Null);
}

#[tokio::test]
async fn test_start_unsupported() {
    let (app, _) = app(EngineScript::unsupported());

    let (status, body) = send(&app, "POST", "/captures", Some(json!({}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "unsupported");
}

#[tokio::test]
async fn test_start_engine_failure() {
    let (app, state) = app(EngineScript::new(vec![AttemptScript::failing("no microphone")]));

    let (status, body) = send(&app, "POST", "/captures", Some(json!({ "capture_id": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "start_failure");
    assert!(state.captures.read().await.is_empty());
}

#[tokio::test]
async fn test_unknown_capture() {
    let (app, _) = app(EngineScript::default());

    let (status, body) = send(&app, "GET", "/captures/missing/status", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Capture missing not found");

    let (status, _) = send(&app, "POST", "/captures/missing/stop", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_starts_with_same_id() {
    let (app, state) = app(EngineScript::new(vec![
        AttemptScript::listening(),
        AttemptScript::listening(),
    ]));
    let body = json!({ "capture_id": "dup" });

    let (first, second) = tokio::join!(
        send(&app, "POST", "/captures", Some(body.clone())),
        send(&app, "POST", "/captures", Some(body.clone())),
    );

    let mut codes = vec![first.0, second.0];
    codes.sort();
    assert_eq!(codes, vec![StatusCode::OK, StatusCode::CONFLICT]);
    assert_eq!(state.captures.read().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_delete_finished_capture() {
    let (app, state) = app(EngineScript::new(vec![
        AttemptScript::listening(),
        AttemptScript::listening(),
    ]));

    let (status, _) = send(&app, "POST", "/captures", Some(json!({ "capture_id": "old" }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "DELETE", "/captures/old", None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    send(&app, "POST", "/captures/old/stop", None).await;
    let controller = state.captures.read().await.get("old").cloned().unwrap();
    controller.wait_stopped().await;

    let (status, _) = send(&app, "DELETE", "/captures/old", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(state.captures.read().await.is_empty());

    let (status, _) = send(&app, "GET", "/captures/old/status", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
