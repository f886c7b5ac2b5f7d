//! Plain HTTP endpoints next to the websocket: a status probe and the
//! operator-only room listing and reset calls.

use crate::AppState;
use crate::room::RoomSnapshot;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Serialize;
use std::sync::Arc;
use tandem_core::RoomId;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub message: String,
    pub status: String,
    pub connected_users: usize,
    pub active_rooms: usize,
}

#[derive(Debug, Serialize)]
pub struct RoomsResponse {
    pub rooms: Vec<RoomSnapshot>,
    pub total_rooms: usize,
    pub connected_users: usize,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rooms_cleared: Option<usize>,
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        message: "Tandem signaling server".to_owned(),
        status: "ok".to_owned(),
        connected_users: state.signaling.connected_count(),
        active_rooms: state.registry.room_count(),
    })
}

pub async fn list_rooms(State(state): State<Arc<AppState>>) -> Json<RoomsResponse> {
    let rooms = state.registry.rooms().await;
    Json(RoomsResponse {
        total_rooms: rooms.len(),
        connected_users: state.signaling.connected_count(),
        rooms,
    })
}

pub async fn reset_rooms(State(state): State<Arc<AppState>>) -> Json<ResetResponse> {
    let cleared = state.registry.reset_all().await;
    Json(ResetResponse {
        success: true,
        message: format!("Reset {} rooms", cleared),
        rooms_cleared: Some(cleared),
    })
}

pub async fn reset_room(
    Path(room_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ResetResponse>) {
    let room_id = match RoomId::parse(&room_id) {
        Ok(id) => id,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ResetResponse {
                    success: false,
                    message: e.to_string(),
                    rooms_cleared: None,
                }),
            );
        }
    };

    if state.registry.reset_room(&room_id).await {
        (
            StatusCode::OK,
            Json(ResetResponse {
                success: true,
                message: format!("Room {} has been reset", room_id),
                rooms_cleared: None,
            }),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ResetResponse {
                success: false,
                message: format!("Room {} does not exist", room_id),
                rooms_cleared: None,
            }),
        )
    }
}
