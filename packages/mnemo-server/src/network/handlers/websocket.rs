//! WebSocket upgrade handler: the control channel (§6). One socket per
//! client, newline-agnostic JSON text frames in, JSON text frames out. A
//! `close` message closes this socket *and* calls
//! [`crate::network::ShutdownController::trigger_shutdown`], which is
//! what lets `main` cancel the decay scheduler and stop accepting new
//! connections (§4.7).

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use mnemo_core::{ClientMessage, ServerMessage};
use tracing::{debug, warn};

use super::AppState;
use crate::dispatcher::DispatchOutcome;
use crate::network::connection::OutboundMessage;

/// Upgrades an HTTP connection to a WebSocket connection and hands it off
/// to [`handle_socket`].
pub async fn ws_upgrade_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Registers the connection, then alternates between reading client frames
/// and draining queued outbound replies until either side closes.
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let (handle, mut outbound_rx) = state.registry.register(&state.config.connection);
    let _guard = state.shutdown.in_flight_guard();
    debug!(connection = handle.id.0, "client connected");

    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(OutboundMessage::Text(text)) => {
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(OutboundMessage::Close(reason)) => {
                        let _ = socket.send(Message::Close(reason.map(|r| axum::extract::ws::CloseFrame {
                            code: axum::extract::ws::close_code::NORMAL,
                            reason: r.into(),
                        }))).await;
                        break;
                    }
                    None => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let reply = dispatch_text(&state, &text).await;
                        match reply {
                            Some(DispatchOutcome::Reply(Some(msg))) => {
                                if let Ok(json) = serde_json::to_string(&msg) {
                                    if socket.send(Message::Text(json.into())).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Some(DispatchOutcome::Reply(None)) => {}
                            Some(DispatchOutcome::Shutdown) => {
                                let _ = socket.send(Message::Close(None)).await;
                                state.shutdown.trigger_shutdown();
                                break;
                            }
                            None => {}
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // binary/ping/pong frames carry no control messages here
                    Some(Err(err)) => {
                        warn!(connection = handle.id.0, error = %err, "websocket read error");
                        break;
                    }
                }
            }
        }
    }

    state.registry.remove(handle.id);
    debug!(connection = handle.id.0, "client disconnected");
}

/// Parses one text frame and dispatches it, turning a JSON parse failure
/// into the same error envelope a validation failure would produce.
async fn dispatch_text(state: &AppState, text: &str) -> Option<DispatchOutcome> {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => Some(state.dispatcher.dispatch(message).await),
        Err(err) => Some(DispatchOutcome::Reply(Some(ServerMessage::error(err.to_string(), None)))),
    }
}
