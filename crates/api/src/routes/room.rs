use axum::{
    Json,
    extract::{Path, State},
};
use fieldchat_db::models::{ChatRoom, RoomKey};
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct ResolveRoomRequest {
    pub client_id: String,
    pub technician_id: String,
    pub intervention_id: String,
}

#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub id: String,
    pub client_id: String,
    pub technician_id: String,
    pub intervention_id: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Returns the room for a (client, technician, intervention) triple,
/// creating it on first use.
pub async fn resolve(
    State(state): State<AppState>,
    Json(body): Json<ResolveRoomRequest>,
) -> Result<Json<RoomResponse>, ApiError> {
    let key = RoomKey::new(
        parse_id(&body.client_id, "client_id")?,
        parse_id(&body.technician_id, "technician_id")?,
        parse_id(&body.intervention_id, "intervention_id")?,
    );
    if key.client_id == key.technician_id {
        return Err(ApiError::BadRequest(
            "client and technician must differ".to_string(),
        ));
    }

    let room_id = state.chat.directory.resolve_room(key).await?;
    let room = state.chat.store.find_room(room_id).await?;

    Ok(Json(to_response(room)))
}

pub async fn get(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomResponse>, ApiError> {
    let rid = parse_id(&room_id, "room_id")?;
    let room = state.chat.store.find_room(rid).await?;
    Ok(Json(to_response(room)))
}

pub async fn list_for_participant(
    State(state): State<AppState>,
    Path(participant_id): Path<String>,
) -> Result<Json<Vec<RoomResponse>>, ApiError> {
    let pid = parse_id(&participant_id, "participant_id")?;
    let rooms = state.chat.directory.rooms_for(pid).await?;
    Ok(Json(rooms.into_iter().map(to_response).collect()))
}

fn to_response(room: ChatRoom) -> RoomResponse {
    RoomResponse {
        id: room.id.map(|id| id.to_hex()).unwrap_or_default(),
        client_id: room.client_id.to_hex(),
        technician_id: room.technician_id.to_hex(),
        intervention_id: room.intervention_id.to_hex(),
        created_at: room.created_at.to_chrono().to_rfc3339(),
        updated_at: room.updated_at.to_chrono().to_rfc3339(),
    }
}
