//! WebSocket endpoint bridging browser observers to the pairing coordinator.
//!
//! Each socket is one observer: outbound frames come from the coordinator's
//! broadcast channel, inbound frames carry the phone number the user typed.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};
use waylink_core::error::PairingError;
use waylink_core::event::{ClientFrame, WireEvent};

use super::ServerState;
use crate::pairing::Coordinator;

const INVALID_NUMBER_MESSAGE: &str = "Invalid phone number format.";
const BUSY_MESSAGE: &str = "Bot is already connecting or connected.";

pub(super) async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<ServerState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state.coordinator))
}

async fn handle_socket(socket: WebSocket, coordinator: Arc<Coordinator>) {
    let (mut sink, mut stream) = socket.split();
    let (observer_id, mut events) = coordinator.attach_browser().await;
    info!("browser observer {observer_id} connected");

    loop {
        tokio::select! {
            event = events.recv() => {
                // The sender lives in the broadcaster; a closed channel means
                // this observer was pruned after its queue overflowed.
                let Some(event) = event else { break };
                if send_frame(&mut sink, &event).await.is_err() {
                    break;
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_client_frame(&coordinator, text.as_str()).await {
                            if send_frame(&mut sink, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("websocket read error: {e}");
                        break;
                    }
                }
            }
        }
    }

    coordinator.detach_observer(observer_id);
    info!("browser observer {observer_id} disconnected");
}

async fn send_frame(
    sink: &mut (impl SinkExt<Message> + Unpin),
    event: &WireEvent,
) -> Result<(), ()> {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!("failed to encode wire event: {e}");
            return Ok(());
        }
    };
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}

/// Process one inbound frame. A returned event goes to this socket only;
/// everything the whole room should see is broadcast by the coordinator.
pub(super) async fn handle_client_frame(
    coordinator: &Arc<Coordinator>,
    text: &str,
) -> Option<WireEvent> {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!("ignoring unparseable client frame: {e}");
            return None;
        }
    };

    match frame {
        ClientFrame::PhoneNumberInput { number } => {
            // The wire contract wants digits only, no separators.
            if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
                return Some(WireEvent::error(INVALID_NUMBER_MESSAGE));
            }
            match coordinator.clone().request_connection(&number).await {
                Ok(()) => None,
                Err(PairingError::InvalidPhoneNumber) => {
                    Some(WireEvent::error(INVALID_NUMBER_MESSAGE))
                }
                Err(PairingError::Busy) => Some(WireEvent::status(BUSY_MESSAGE)),
                // Already broadcast to every observer as a pairing failure.
                Err(PairingError::Transport(_)) => None,
            }
        }
    }
}
