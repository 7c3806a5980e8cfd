//! HTTP routes of the development store

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use storyloom_editor::{Block, ChapterRef, DbOperation, ParagraphNode, Place};
use storyloom_sync::server::router;
use storyloom_sync::{InMemoryStore, StoreRequest};
use tower::ServiceExt;

fn chapter() -> ChapterRef {
    ChapterRef::new("s1", "c1")
}

async fn send(store: &Arc<InMemoryStore>, request: &StoreRequest) -> (StatusCode, Value) {
    let http = Request::builder()
        .method(request.method())
        .uri(request.path())
        .header("content-type", "application/json")
        .body(Body::from(request.body().to_string()))
        .unwrap();
    call(store, http).await
}

async fn call(store: &Arc<InMemoryStore>, request: Request<Body>) -> (StatusCode, Value) {
    let response = router(store.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn block(key: &str, text: &str) -> Block {
    Block::from_paragraph(&ParagraphNode::new(key).with_text(text), Some(Place::sequence(1).remove(0)))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let store = Arc::new(InMemoryStore::new());
    let request = Request::get("/health").body(Body::empty()).unwrap();
    let response = router(store).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_save_then_load() {
    let store = Arc::new(InMemoryStore::new());
    let save = StoreRequest::from_operation(&DbOperation::save(&chapter(), block("p1", "Hello")));

    let (status, body) = send(&store, &save).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["assigned"], json!([]));

    let request = Request::get("/stories/s1/chapters/c1").body(Body::empty()).unwrap();
    let (status, body) = call(&store, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["blocks"][0]["key_id"], "p1");
}

#[tokio::test]
async fn test_delete_removes_block() {
    let store = Arc::new(InMemoryStore::new());
    store.load_chapter(&chapter(), vec![block("p1", "Hello")]);
    let delete = StoreRequest::from_operation(&DbOperation::delete(&chapter(), "p1".into()));

    let (status, _) = send(&store, &delete).await;

    assert_eq!(status, StatusCode::OK);
    assert!(store.chapter_blocks(&chapter()).is_empty());
}

#[tokio::test]
async fn test_save_without_chunk_is_rejected() {
    let store = Arc::new(InMemoryStore::new());
    let request = Request::put("/stories/s1/chapters/c1")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "blocks": [{ "key_id": "p1" }] }).to_string()))
        .unwrap();

    let (status, body) = call(&store, request).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("p1"));
}

#[tokio::test]
async fn test_order_for_other_chapter_is_rejected() {
    let store = Arc::new(InMemoryStore::new());
    let request = Request::put("/stories/s1/chapters/c1/order")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "chapter_id": "c2", "blocks": [] }).to_string()))
        .unwrap();

    let (status, _) = call(&store, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}
