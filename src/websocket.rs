use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info};

use crate::handlers;
use crate::protocol::ServerMessage;
use crate::state::AppState;

pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let client_uid = state.generate_client_uid();
    info!("New WebSocket connection: {}", client_uid);

    let widget = state.open_widget(&client_uid);
    let mut updates = widget.subscribe();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let (mut sender, mut receiver) = socket.split();

    // Initial state so the page can render before the first edit.
    let _ = outbound.send(ServerMessage::TranslationState(widget.snapshot()));

    let writer = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                Some(msg) = outbound_rx.recv() => msg,
                update = updates.recv() => match update {
                    Ok(snapshot) => ServerMessage::TranslationState(snapshot),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Skipped {} stale state updates", skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                else => break,
            };

            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode frame: {}", e);
                    continue;
                }
            };
            if let Err(e) = sender.send(Message::Text(text)).await {
                error!("Failed to send message: {}", e);
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Err(e) = handlers::handle_message(&state, &client_uid, &widget, &text, &outbound) {
                    error!("Error handling message: {}", e);
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {} disconnected", client_uid);
                break;
            }
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    state.close_widget(&client_uid);
    writer.abort();
    info!("Cleaned up client {}", client_uid);
}
