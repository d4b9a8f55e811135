use axum::{
    Json,
    extract::{Path, Query, State},
};
use fieldchat_protocol::MessagePayload;
use fieldchat_services::chat::message_payload;
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct ReaderRequest {
    pub reader_id: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub room_id: String,
    pub items: Vec<MessagePayload>,
    pub total: usize,
}

/// Full message history of a room, oldest first.
pub async fn list(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let rid = parse_id(&room_id, "room_id")?;
    let history = state.chat.store.history(rid).await?;

    let items: Vec<MessagePayload> = history.iter().map(|m| message_payload(rid, m)).collect();
    Ok(Json(HistoryResponse {
        room_id,
        total: items.len(),
        items,
    }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path((room_id, message_id)): Path<(String, String)>,
    Json(body): Json<ReaderRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rid = parse_id(&room_id, "room_id")?;
    let mid = parse_id(&message_id, "message_id")?;
    let reader = parse_id(&body.reader_id, "reader_id")?;

    state.chat.mark_read_by(reader, rid, mid).await?;

    Ok(Json(serde_json::json!({ "read": true })))
}

pub async fn unread(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(params): Query<ReaderRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rid = parse_id(&room_id, "room_id")?;
    let reader = parse_id(&params.reader_id, "reader_id")?;

    let count = state.chat.store.unread_count(rid, reader).await?;

    Ok(Json(serde_json::json!({ "unread": count })))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(body): Json<ReaderRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rid = parse_id(&room_id, "room_id")?;
    let reader = parse_id(&body.reader_id, "reader_id")?;

    let key = state.chat.directory.participants(rid).await?;
    if !key.has_participant(&reader) {
        return Err(ApiError::Forbidden("Not a participant".to_string()));
    }
    let updated = state.chat.store.mark_all_read(rid, reader).await?;

    Ok(Json(serde_json::json!({ "updated": updated })))
}
