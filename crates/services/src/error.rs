use fieldchat_protocol::ErrorCode;

pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("room not found")]
    RoomNotFound,
    #[error("message not found")]
    MessageNotFound,
    #[error("a room already exists for this client, technician and intervention")]
    DuplicateRoom,
    #[error("invalid content: {0}")]
    InvalidContent(String),
    #[error("session has not joined this room")]
    NotAMember,
    #[error("sender is not a participant of this room")]
    NotAParticipant,
    #[error("unknown session: {0}")]
    UnknownSession(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("storage: {0}")]
    Storage(String),
    #[error("mongo: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("bson serialization: {0}")]
    BsonSer(#[from] bson::ser::Error),
    #[error("bson deserialization: {0}")]
    BsonDe(#[from] bson::de::Error),
}

impl ChatError {
    /// The code reported to a WebSocket session when its request fails.
    pub fn code(&self) -> ErrorCode {
        match self {
            ChatError::RoomNotFound => ErrorCode::RoomNotFound,
            ChatError::MessageNotFound => ErrorCode::MessageNotFound,
            ChatError::DuplicateRoom => ErrorCode::DuplicateRoom,
            ChatError::InvalidContent(_) => ErrorCode::InvalidContent,
            ChatError::NotAMember => ErrorCode::NotAMember,
            ChatError::NotAParticipant => ErrorCode::NotAParticipant,
            ChatError::UnknownSession(_) | ChatError::Forbidden(_) => ErrorCode::Forbidden,
            ChatError::Storage(_)
            | ChatError::Mongo(_)
            | ChatError::BsonSer(_)
            | ChatError::BsonDe(_) => ErrorCode::Internal,
        }
    }
}
