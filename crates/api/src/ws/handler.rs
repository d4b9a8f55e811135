use axum::{
    extract::{Query, State, WebSocketUpgrade, ws::{Message, WebSocket}},
    response::{IntoResponse, Response},
};
use bson::oid::ObjectId;
use fieldchat_protocol::{ClientEvent, ConnectParams, ErrorCode, ServerEvent};
use fieldchat_services::{
    ChatError,
    chat::{Session, message_payload},
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let participant_id = match ObjectId::parse_str(&params.participant_id) {
        Ok(id) => id,
        Err(_) => {
            return ApiError::BadRequest("Invalid participant_id".to_string()).into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, participant_id, params))
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    participant_id: ObjectId,
    params: ConnectParams,
) {
    let session_id = Uuid::new_v4().to_string();
    info!(%participant_id, kind = params.kind.as_str(), %session_id, "WebSocket connected");

    let (mut sender, mut receiver) = socket.split();
    let (outbox, mut inbox) = mpsc::unbounded_channel::<ServerEvent>();

    state.chat.presence.register(
        Session {
            id: session_id.clone(),
            participant_id,
            kind: params.kind,
            display_name: params.display_name,
        },
        outbox.clone(),
    );

    // Replies, fan-out and typing all go through one queue so a session sees
    // them in the order they were produced.
    let writer_session = session_id.clone();
    let writer = tokio::spawn(async move {
        while let Some(event) = inbox.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!(session_id = %writer_session, %e, "Failed to encode WS frame");
                    continue;
                }
            };
            if let Err(e) = sender.send(Message::text(text)).await {
                debug!(session_id = %writer_session, %e, "WS send failed, closing writer");
                break;
            }
        }
    });

    let _ = outbox.send(ServerEvent::Connected {
        session_id: session_id.clone(),
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Some(reply) = handle_client_message(&state, &session_id, text.as_str()).await {
                    let _ = outbox.send(reply);
                }
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                warn!(%session_id, %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    state.chat.dispatcher.disconnect(&session_id);
    drop(outbox);
    writer.abort();

    info!(%participant_id, %session_id, "WebSocket disconnected");
}

async fn handle_client_message(state: &AppState, session_id: &str, text: &str) -> Option<ServerEvent> {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            return Some(ServerEvent::Error {
                request_id: None,
                code: ErrorCode::BadRequest,
                message: format!("Malformed frame: {e}"),
            });
        }
    };

    debug!(%session_id, ?event, "WS message received");
    let dispatcher = &state.chat.dispatcher;

    match event {
        ClientEvent::JoinRoom { request_id, room_id } => Some(match parse_room_id(&room_id) {
            None => invalid_room_id(request_id),
            Some(rid) => match dispatcher.join(session_id, rid).await {
                Ok(()) => ServerEvent::Joined { request_id, room_id },
                Err(e) => rejected(request_id, e),
            },
        }),
        ClientEvent::LeaveRoom { request_id, room_id } => Some(match parse_room_id(&room_id) {
            None => invalid_room_id(request_id),
            Some(rid) => {
                dispatcher.leave(session_id, rid);
                ServerEvent::Left { request_id, room_id }
            }
        }),
        ClientEvent::SendMessage {
            request_id,
            room_id,
            content,
        } => Some(match parse_room_id(&room_id) {
            None => invalid_room_id(request_id),
            Some(rid) => match dispatcher.send_message(session_id, rid, &content).await {
                Ok(message) => ServerEvent::MessageSent {
                    request_id,
                    message: message_payload(rid, &message),
                },
                Err(e) => rejected(request_id, e),
            },
        }),
        ClientEvent::UserTyping { room_id, is_typing } => {
            if let Some(rid) = parse_room_id(&room_id) {
                dispatcher.send_typing(session_id, rid, is_typing);
            }
            None
        }
        ClientEvent::Ping => Some(ServerEvent::Pong),
    }
}

fn parse_room_id(raw: &str) -> Option<ObjectId> {
    ObjectId::parse_str(raw).ok()
}

fn invalid_room_id(request_id: Option<String>) -> ServerEvent {
    ServerEvent::Error {
        request_id,
        code: ErrorCode::BadRequest,
        message: "Invalid room_id".to_string(),
    }
}

fn rejected(request_id: Option<String>, err: ChatError) -> ServerEvent {
    match err.code() {
        ErrorCode::Internal => warn!(%err, "Chat request failed"),
        _ => debug!(%err, "Chat request rejected"),
    }
    ServerEvent::Error {
        request_id,
        code: err.code(),
        message: err.to_string(),
    }
}
