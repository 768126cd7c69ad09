//! HTTP routing tests against the axum app.

mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

use agent_relay::relay::{FrameDecoder, WireEvent, END_FRAME};
use agent_relay::server::router;

use common::sample_registry;

fn app() -> Router {
    router(Arc::new(sample_registry()))
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
    let resp = app.oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn send_json(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    (status, serde_json::from_str(&body).unwrap())
}

#[tokio::test]
async fn health_lists_loaded_agents() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send_json(app(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "agents": ["chatbot", "echo", "flaky"]}));
}

#[tokio::test]
async fn invoke_returns_ai_message() {
    let (status, body) = send_json(app(), post("/chatbot/invoke", json!({"message": "hello"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"type": "ai", "content": "hi"}));
}

#[tokio::test]
async fn invoke_failure_is_500_with_detail() {
    let (status, body) = send_json(app(), post("/flaky/invoke", json!({"message": "hello"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"detail": "Agent error: model exploded"}));
}

#[tokio::test]
async fn unknown_agent_is_404() {
    for route in ["/ghost/invoke", "/ghost/stream"] {
        let (status, body) = send_json(app(), post(route, json!({"message": "hello"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{route}");
        assert!(body["detail"].as_str().unwrap().contains("ghost"));
    }

    let request = Request::builder().uri("/nowhere").body(Body::empty()).unwrap();
    let (status, body) = send_json(app(), request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"detail": "Not Found"}));
}

#[tokio::test]
async fn blank_message_is_422() {
    for route in ["/chatbot/invoke", "/chatbot/stream"] {
        let (status, body) = send_json(app(), post(route, json!({"message": "   "}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{route}");
        assert_eq!(body, json!({"detail": "message must not be empty"}));
    }
}

#[tokio::test]
async fn malformed_body_is_422() {
    let (status, body) = send_json(app(), post("/chatbot/invoke", json!({"text": "hello"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn stream_is_event_stream_ending_with_end_frame() {
    let resp = app()
        .oneshot(post("/chatbot/stream", json!({"message": "hello", "thread_id": "t-1"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(resp.headers()[header::CACHE_CONTROL], "no-cache");

    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert_eq!(body, format!("data: {{\"type\":\"token\",\"content\":\"hi\"}}\n\n{END_FRAME}"));
}

#[tokio::test]
async fn stream_failure_is_still_200_with_error_frame() {
    let (status, body) = send(app(), post("/flaky/stream", json!({"message": "hello"}))).await;
    assert_eq!(status, StatusCode::OK);

    let mut decoder = FrameDecoder::new();
    assert_eq!(
        decoder.feed(&body),
        vec![
            WireEvent::token("partial"),
            WireEvent::error("Agent error: model exploded"),
            WireEvent::End,
        ]
    );
    assert!(body.ends_with(END_FRAME));
}

#[tokio::test]
async fn stream_tokens_can_be_disabled() {
    let (_, body) = send(
        app(),
        post("/echo/stream", json!({"message": "hello", "stream_tokens": false})),
    )
    .await;
    assert_eq!(body, END_FRAME);
}

#[tokio::test]
async fn thread_id_is_shared_across_requests() {
    let app = app();
    let body = json!({"message": "hello", "thread_id": "t-9"});
    let (_, first) = send_json(app.clone(), post("/echo/invoke", body)).await;
    let body = json!({"message": "again", "thread_id": "t-9"});
    let (_, second) = send_json(app, post("/echo/invoke", body)).await;
    assert_eq!(first["content"], "#1 hello");
    assert_eq!(second["content"], "#2 again");
}
