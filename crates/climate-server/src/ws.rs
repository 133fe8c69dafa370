//! WebSocket live push.
//!
//! Each socket registers an mpsc channel with the monitor. The distributor only ever
//! `try_send`s into it, so a slow socket is dropped instead of stalling ingestion.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use climate_live::LiveMessage;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::state::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (tx, mut rx) = mpsc::channel::<LiveMessage>(state.subscriber_buffer());

    let monitor = state.monitor().clone();
    let id = match tokio::task::spawn_blocking(move || monitor.connect(Box::new(tx))).await {
        Ok(Ok(id)) => id,
        Ok(Err(err)) => {
            warn!(error = %err, "live subscriber rejected");
            return;
        }
        Err(err) => {
            error!(error = %err, "live subscriber registration failed");
            return;
        }
    };

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            message = rx.recv() => {
                // None: the distributor dropped this subscriber.
                let Some(message) = message else {
                    debug!(subscriber = %id, "live channel closed");
                    break;
                };
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(err) => {
                        error!(error = %err, "failed to encode live message");
                        continue;
                    }
                };
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Clients only listen; anything they send is ignored.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.monitor().disconnect(id);
}
