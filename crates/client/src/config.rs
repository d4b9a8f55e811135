use std::time::Duration;

use fieldchat_protocol::{ConnectParams, ParticipantKind};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub participant_id: String,
    pub kind: ParticipantKind,
    pub display_name: String,
    /// Upper bound on the WebSocket handshake plus the server's `connected` frame.
    pub connect_timeout: Duration,
    /// Upper bound on waiting for the reply to a join, leave or send.
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(participant_id: impl Into<String>, kind: ParticipantKind) -> Self {
        Self {
            participant_id: participant_id.into(),
            kind,
            display_name: String::new(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub(crate) fn connect_params(&self) -> ConnectParams {
        ConnectParams {
            participant_id: self.participant_id.clone(),
            kind: self.kind,
            display_name: self.display_name.clone(),
        }
    }
}
