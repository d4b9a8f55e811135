pub mod directory;
pub mod dispatcher;
pub mod memory;
pub mod presence;
pub mod store;

use std::sync::Arc;

use bson::oid::ObjectId;
use fieldchat_db::models::Message;
use fieldchat_protocol::MessagePayload;

pub use directory::RoomDirectory;
pub use dispatcher::Dispatcher;
pub use memory::MemoryChatStore;
pub use presence::{DeliveryError, Outbox, PresenceRegistry, Session};
pub use store::MessageStore;

use crate::error::{ChatError, ChatResult};

/// The conversation subsystem wired together around one message store.
#[derive(Clone)]
pub struct ChatHub {
    pub store: Arc<dyn MessageStore>,
    pub directory: Arc<RoomDirectory>,
    pub presence: Arc<PresenceRegistry>,
    pub dispatcher: Arc<Dispatcher>,
}

impl ChatHub {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        let directory = Arc::new(RoomDirectory::new(store.clone()));
        let presence = Arc::new(PresenceRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(
            store.clone(),
            directory.clone(),
            presence.clone(),
        ));
        Self {
            store,
            directory,
            presence,
            dispatcher,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryChatStore::new()))
    }

    /// Marks a message read on behalf of the other party of the room.
    pub async fn mark_read_by(
        &self,
        reader_id: ObjectId,
        room_id: ObjectId,
        message_id: ObjectId,
    ) -> ChatResult<()> {
        let key = self.directory.participants(room_id).await?;
        if !key.has_participant(&reader_id) {
            return Err(ChatError::NotAParticipant);
        }

        let history = self.store.history(room_id).await?;
        let message = history
            .iter()
            .find(|m| m.id == message_id)
            .ok_or(ChatError::MessageNotFound)?;
        if message.sender_id == reader_id {
            return Err(ChatError::Forbidden(
                "senders cannot mark their own messages read".to_string(),
            ));
        }

        self.store.mark_read(room_id, message_id).await
    }
}

pub fn message_payload(room_id: ObjectId, message: &Message) -> MessagePayload {
    MessagePayload {
        id: message.id.to_hex(),
        room_id: room_id.to_hex(),
        sender_id: message.sender_id.to_hex(),
        content: message.content.clone(),
        read: message.read,
        created_at: message.created_at.to_chrono(),
    }
}
