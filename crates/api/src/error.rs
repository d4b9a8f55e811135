use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use fieldchat_services::ChatError;
use serde::Serialize;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Forbidden(String),
    Conflict(String),
    Internal(String),
    Validation(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {msg}"),
            ApiError::BadRequest(msg) => write!(f, "Bad request: {msg}"),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            ApiError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            ApiError::Internal(msg) => write!(f, "Internal error: {msg}"),
            ApiError::Validation(msg) => write!(f, "Validation: {msg}"),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg),
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "validation", msg),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::RoomNotFound | ChatError::MessageNotFound => ApiError::NotFound(err.to_string()),
            ChatError::DuplicateRoom => ApiError::Conflict(err.to_string()),
            ChatError::InvalidContent(msg) => ApiError::Validation(msg),
            ChatError::NotAMember | ChatError::NotAParticipant | ChatError::UnknownSession(_) => {
                ApiError::Forbidden(err.to_string())
            }
            ChatError::Forbidden(msg) => ApiError::Forbidden(msg),
            ChatError::Storage(_)
            | ChatError::Mongo(_)
            | ChatError::BsonSer(_)
            | ChatError::BsonDe(_) => {
                tracing::error!(%err, "Storage failure");
                ApiError::Internal("storage failure".to_string())
            }
        }
    }
}
