//! Plain HTTP surface for clients that cannot hold a WebSocket open:
//! `GET /state` returns the latest state frame, `POST /action` accepts the
//! same action messages the socket does.

use crate::gateway::ClientGateway;
use crate::ws::ws_handler;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn router(gateway: Arc<ClientGateway>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/state", get(get_state))
        .route("/action", post(post_action))
        .route("/health", get(health))
        .with_state(gateway)
}

async fn health() -> impl IntoResponse {
    "ok"
}

async fn get_state(State(gateway): State<Arc<ClientGateway>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        gateway.latest_frame(),
    )
}

async fn post_action(
    State(gateway): State<Arc<ClientGateway>>,
    body: String,
) -> impl IntoResponse {
    gateway.handle_client_text(&body);
    StatusCode::NO_CONTENT
}
