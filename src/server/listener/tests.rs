use axum::{body::Body, extract::Request, http::StatusCode, Router};
use futures::{
    channel::mpsc::{channel, Receiver},
    StreamExt,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::util::ServiceExt;

use crate::event::{Delivery, EventKind};
use crate::fixtures::{MERGE_REQUEST, PUSH};

use super::{router, AppState, WEBHOOK_PATH};

fn app() -> (Router, Receiver<Delivery>) {
    let (sender, receiver) = channel(1);
    (router(AppState { sender }), receiver)
}

fn make_webhook_request<B: Into<Body>>(body: B) -> Request {
    Request::builder()
        .method("POST")
        .uri(WEBHOOK_PATH)
        .header("Content-Type", "application/json")
        .header("X-Gitlab-Event", "Merge Request Hook")
        .body(body.into())
        .unwrap()
}

async fn body_string(body: Body) -> String {
    String::from_utf8_lossy(&body.collect().await.unwrap().to_bytes()).into_owned()
}

#[tokio::test]
async fn should_enqueue_merge_request_event() {
    let (app, mut recv) = app();
    let res = app.oneshot(make_webhook_request(MERGE_REQUEST)).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK, "{res:?}");
    assert_eq!(body_string(res.into_body()).await, "enqueued");
    let expected: Value = serde_json::from_str(MERGE_REQUEST).unwrap();
    assert_eq!(
        recv.next().await,
        Some(Delivery {
            kind: EventKind::MergeRequest,
            payload: expected,
        })
    );
}

#[tokio::test]
async fn should_enqueue_push_event() {
    let (app, mut recv) = app();
    let res = app.oneshot(make_webhook_request(PUSH)).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK, "{res:?}");
    assert_eq!(body_string(res.into_body()).await, "enqueued");
    assert_eq!(recv.next().await.map(|d| d.kind), Some(EventKind::Push));
}

#[tokio::test]
async fn should_skip_other_events() {
    let (app, mut recv) = app();
    let body = r#"{"object_kind": "note", "object_attributes": {"note": "hi"}}"#;
    let res = app.oneshot(make_webhook_request(body)).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK, "{res:?}");
    assert_eq!(body_string(res.into_body()).await, "skipped");
    assert!(recv.next().await.is_none());
}

#[tokio::test]
async fn should_reject_invalid_json() {
    let (app, mut recv) = app();
    let res = app.oneshot(make_webhook_request("{not json")).await.unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{res:?}");
    assert!(recv.next().await.is_none());
}

#[tokio::test]
async fn should_fail_when_runner_is_gone() {
    let (app, recv) = app();
    drop(recv);
    let res = app.oneshot(make_webhook_request(PUSH)).await.unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR, "{res:?}");
    assert_eq!(
        body_string(res.into_body()).await,
        "Error: Failed to send event"
    );
}

#[tokio::test]
async fn should_report_health() {
    let (app, _recv) = app();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let res = app.oneshot(request).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK, "{res:?}");
    assert_eq!(body_string(res.into_body()).await, "OK");
}
