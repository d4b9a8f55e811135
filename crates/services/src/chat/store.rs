use async_trait::async_trait;
use bson::oid::ObjectId;
use fieldchat_db::models::{ChatRoom, MAX_CONTENT_CHARS, Message, MessageDraft, RoomKey};
use validator::Validate;

use crate::error::{ChatError, ChatResult};

/// Authoritative, append-only storage of rooms and their message history.
///
/// Rooms returned by the lookup methods carry no messages; read them with
/// [`MessageStore::history`].
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Creates the room for `key`, failing with [`ChatError::DuplicateRoom`]
    /// if one already exists.
    async fn create_room(&self, key: RoomKey) -> ChatResult<ChatRoom>;

    /// Returns the room for `key`, creating it if needed. Concurrent callers
    /// with the same key observe the same room.
    async fn find_or_create_room(&self, key: RoomKey) -> ChatResult<ChatRoom>;

    async fn find_room(&self, room_id: ObjectId) -> ChatResult<ChatRoom>;

    /// Rooms in which `participant_id` is the client or the technician,
    /// most recently active first.
    async fn find_rooms_for_participant(&self, participant_id: ObjectId) -> ChatResult<Vec<ChatRoom>>;

    /// Validates and appends a message. The sender must be the room's client
    /// or technician.
    async fn append_message(
        &self,
        room_id: ObjectId,
        sender_id: ObjectId,
        content: &str,
    ) -> ChatResult<Message>;

    /// Sets the read flag. Marking an already read message succeeds.
    async fn mark_read(&self, room_id: ObjectId, message_id: ObjectId) -> ChatResult<()>;

    /// All messages of the room in append order.
    async fn history(&self, room_id: ObjectId) -> ChatResult<Vec<Message>>;

    async fn unread_count(&self, room_id: ObjectId, reader_id: ObjectId) -> ChatResult<u64> {
        let history = self.history(room_id).await?;
        Ok(history
            .iter()
            .filter(|m| !m.read && m.sender_id != reader_id)
            .count() as u64)
    }

    /// Marks every message not sent by `reader_id` as read and returns how
    /// many changed.
    async fn mark_all_read(&self, room_id: ObjectId, reader_id: ObjectId) -> ChatResult<u64>;
}

/// Trims `raw` and checks it against the content bounds.
pub fn validate_content(raw: &str) -> ChatResult<MessageDraft> {
    let draft = MessageDraft::new(raw);
    match draft.validate() {
        Ok(()) => Ok(draft),
        Err(_) if draft.content.is_empty() => Err(ChatError::InvalidContent(
            "message must not be empty".to_string(),
        )),
        Err(_) => Err(ChatError::InvalidContent(format!(
            "message exceeds {MAX_CONTENT_CHARS} characters"
        ))),
    }
}

pub(crate) fn room_id_of(room: &ChatRoom) -> ChatResult<ObjectId> {
    room.id
        .ok_or_else(|| ChatError::Storage("room has no _id".to_string()))
}
