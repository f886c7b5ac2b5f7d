use crate::AppState;
use crate::room::LeaveReason;
use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tandem_core::{RoomId, SignalMessage, UserId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(user_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let user_id = match UserId::parse(&user_id) {
        Ok(id) => id,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, user_id, state))
        .into_response()
}

async fn handle_socket(socket: WebSocket, user_id: UserId, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    if !state.signaling.add_peer(user_id.clone(), tx) {
        warn!("Refusing duplicate connection for {}", user_id);
        let refusal = SignalMessage::error(format!("User {} is already connected", user_id));
        if let Ok(json) = refusal.encode() {
            let _ = sender.send(Message::Text(json.into())).await;
        }
        let _ = sender
            .send(Message::Close(Some(CloseFrame {
                code: close_code::POLICY,
                reason: "duplicate user id".into(),
            })))
            .await;
        return;
    }
    info!("New WebSocket connection: {}", user_id);

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let state = state.clone();
        let user_id = user_id.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match SignalMessage::decode(text.as_str()) {
                        Ok(signal) => handle_signal(&state, &user_id, signal).await,
                        Err(e) => warn!("Invalid SignalMessage from {}: {}", user_id, e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    // the id stays taken until the membership is released
    state
        .registry
        .leave(&user_id, LeaveReason::Disconnected)
        .await;
    state.signaling.remove_peer(&user_id);
    info!("WebSocket disconnected: {}", user_id);
}

async fn handle_signal(state: &AppState, user_id: &UserId, signal: SignalMessage) {
    debug!("{} from {}", signal.kind(), user_id);

    match signal {
        SignalMessage::JoinRoom { room_id } => {
            let reply = match RoomId::parse(room_id.as_str()) {
                Ok(room_id) => {
                    SignalMessage::RoomJoined(state.registry.join(user_id, room_id).await)
                }
                Err(e) => SignalMessage::error(e.to_string()),
            };
            state.signaling.deliver(user_id, &reply);
        }

        SignalMessage::LeaveRoom => {
            state.registry.leave(user_id, LeaveReason::Left).await;
        }

        signal if signal.is_relayed() => {
            let is_candidate = matches!(signal, SignalMessage::IceCandidate { .. });
            let Err(e) = state.registry.relay(user_id, signal).await else {
                return;
            };
            if is_candidate {
                debug!("Dropping ICE candidate from {}: {}", user_id, e);
            } else {
                state
                    .signaling
                    .deliver(user_id, &SignalMessage::error(e.to_string()));
            }
        }

        other => warn!("Unexpected {} from {}", other.kind(), user_id),
    }
}
