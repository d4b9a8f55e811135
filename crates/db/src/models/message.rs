use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Upper bound on message length, in characters, after trimming.
pub const MAX_CONTENT_CHARS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub sender_id: ObjectId,
    pub content: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Message {
    /// Builds a message from already validated content.
    pub fn new(sender_id: ObjectId, draft: MessageDraft) -> Self {
        let now = DateTime::now();
        Self {
            id: ObjectId::new(),
            sender_id,
            content: draft.content,
            read: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Trimmed message content awaiting validation.
#[derive(Debug, Clone, Validate)]
pub struct MessageDraft {
    #[validate(length(min = 1, max = 1000))]
    pub content: String,
}

impl MessageDraft {
    pub fn new(raw: &str) -> Self {
        Self {
            content: raw.trim().to_string(),
        }
    }
}
