//! WebSocket endpoint. Each connection gets the current state immediately,
//! then every broadcast frame until it disconnects. Inbound frames go through
//! the gateway dispatcher; a dropped connection affects nobody else.

use crate::gateway::ClientGateway;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

pub async fn ws_handler(
    State(gateway): State<Arc<ClientGateway>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, gateway))
}

async fn handle_socket(socket: WebSocket, gateway: Arc<ClientGateway>) {
    let (mut sender, mut receiver) = socket.split();

    if sender
        .send(Message::Text(gateway.latest_frame()))
        .await
        .is_err()
    {
        return;
    }
    let mut updates = gateway.subscribe();
    tracing::info!("client connected");

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(frame) => {
                    if sender.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "slow client, resyncing to latest state");
                    if sender
                        .send(Message::Text(gateway.latest_frame()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => gateway.handle_client_text(&text),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::debug!(error = %err, "websocket receive error");
                    break;
                }
            },
        }
    }
    tracing::info!("client disconnected");
}
