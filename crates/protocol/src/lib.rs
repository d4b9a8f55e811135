//! Wire protocol spoken over `/ws` between the chat server and the
//! client/technician apps.
//!
//! Every frame is a JSON text message shaped `{"type": "...", "data": {...}}`.
//! Identifiers travel as 24-character hex strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side of the service relationship a participant is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantKind {
    Client,
    Technician,
}

impl ParticipantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantKind::Client => "client",
            ParticipantKind::Technician => "technician",
        }
    }
}

/// Query parameters of the WebSocket upgrade request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectParams {
    pub participant_id: String,
    pub kind: ParticipantKind,
    #[serde(default)]
    pub display_name: String,
}

impl ConnectParams {
    pub fn to_query(&self) -> String {
        format!(
            "participant_id={}&kind={}&display_name={}",
            urlencoding::encode(&self.participant_id),
            self.kind.as_str(),
            urlencoding::encode(&self.display_name),
        )
    }
}

/// A persisted message as seen by apps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Frames sent by a session to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinRoom {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        room_id: String,
    },
    LeaveRoom {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        room_id: String,
    },
    SendMessage {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        room_id: String,
        content: String,
    },
    UserTyping {
        room_id: String,
        is_typing: bool,
    },
    Ping,
}

/// Frames sent by the server to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// First frame on every connection.
    Connected { session_id: String },
    ReceiveMessage { message: MessagePayload },
    UserTyping {
        room_id: String,
        sender_id: String,
        is_typing: bool,
    },
    Joined {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        room_id: String,
    },
    Left {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        room_id: String,
    },
    MessageSent {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        message: MessagePayload,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        code: ErrorCode,
        message: String,
    },
    Pong,
}

impl ServerEvent {
    /// The correlation id of a reply, if this frame answers a request.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            ServerEvent::Joined { request_id, .. }
            | ServerEvent::Left { request_id, .. }
            | ServerEvent::MessageSent { request_id, .. }
            | ServerEvent::Error { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    RoomNotFound,
    MessageNotFound,
    DuplicateRoom,
    InvalidContent,
    NotAMember,
    NotAParticipant,
    Forbidden,
    BadRequest,
    Internal,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCode::RoomNotFound => "room_not_found",
            ErrorCode::MessageNotFound => "message_not_found",
            ErrorCode::DuplicateRoom => "duplicate_room",
            ErrorCode::InvalidContent => "invalid_content",
            ErrorCode::NotAMember => "not_a_member",
            ErrorCode::NotAParticipant => "not_a_participant",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::BadRequest => "bad_request",
            ErrorCode::Internal => "internal",
        };
        f.write_str(s)
    }
}
