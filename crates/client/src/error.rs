use fieldchat_protocol::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport failure or timeout. The connector does not retry.
    #[error("connection error: {0}")]
    Connection(String),
    /// The server refused the request.
    #[error("{code}: {message}")]
    Rejected { code: ErrorCode, message: String },
    #[error("connection closed")]
    Closed,
}

impl ClientError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }
}
