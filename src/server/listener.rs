use futures::{channel::mpsc::Sender, SinkExt};

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tower_http::trace::TraceLayer;

use crate::event::{Delivery, EventKind};

pub(crate) const WEBHOOK_PATH: &str = "/review/webhook";

#[derive(Debug, Clone)]
struct AppState {
    sender: Sender<Delivery>,
}

async fn handle(
    State(mut state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<String, (StatusCode, String)> {
    let Some(kind) = EventKind::of(&payload) else {
        tracing::info!("Ignoring unsupported webhook delivery");
        return Ok("skipped".to_owned());
    };
    tracing::info!("Received {kind} event");
    state
        .sender
        .send(Delivery { kind, payload })
        .await
        .map(|()| "enqueued".to_owned())
        .map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error: Failed to send event".to_owned(),
            )
        })
}

async fn health() -> &'static str {
    "OK"
}

fn router(state: AppState) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, post(handle))
        .route("/health", get(health))
        .with_state(state)
}

pub(crate) fn listen(sender: Sender<Delivery>) -> Router {
    router(AppState { sender }).layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests;
