use async_trait::async_trait;
use bson::{DateTime, oid::ObjectId};
use dashmap::{DashMap, mapref::entry::Entry};
use fieldchat_db::models::{ChatRoom, Message, RoomKey};
use tracing::info;

use super::store::{MessageStore, validate_content};
use crate::error::{ChatError, ChatResult};

/// Process-local message store. History does not survive a restart.
#[derive(Default)]
pub struct MemoryChatStore {
    rooms: DashMap<ObjectId, ChatRoom>,
    by_key: DashMap<RoomKey, ObjectId>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn summary(room: &ChatRoom) -> ChatRoom {
        ChatRoom {
            messages: Vec::new(),
            ..room.clone()
        }
    }

    fn insert_new(&self, key: RoomKey) -> (ObjectId, ChatRoom) {
        let id = ObjectId::new();
        let room = ChatRoom {
            id: Some(id),
            ..ChatRoom::new(key)
        };
        self.rooms.insert(id, room.clone());
        info!(room_id = %id, "Chat room created");
        (id, room)
    }

    fn summary_of(&self, room_id: ObjectId) -> ChatResult<ChatRoom> {
        self.rooms
            .get(&room_id)
            .map(|room| Self::summary(&room))
            .ok_or(ChatError::RoomNotFound)
    }
}

#[async_trait]
impl MessageStore for MemoryChatStore {
    async fn create_room(&self, key: RoomKey) -> ChatResult<ChatRoom> {
        match self.by_key.entry(key) {
            Entry::Occupied(_) => Err(ChatError::DuplicateRoom),
            Entry::Vacant(slot) => {
                let (id, room) = self.insert_new(key);
                slot.insert(id);
                Ok(room)
            }
        }
    }

    async fn find_or_create_room(&self, key: RoomKey) -> ChatResult<ChatRoom> {
        let room_id = match self.by_key.entry(key) {
            Entry::Occupied(slot) => *slot.get(),
            Entry::Vacant(slot) => {
                let (id, room) = self.insert_new(key);
                slot.insert(id);
                return Ok(room);
            }
        };
        self.summary_of(room_id)
    }

    async fn find_room(&self, room_id: ObjectId) -> ChatResult<ChatRoom> {
        self.summary_of(room_id)
    }

    async fn find_rooms_for_participant(&self, participant_id: ObjectId) -> ChatResult<Vec<ChatRoom>> {
        let mut rooms: Vec<ChatRoom> = self
            .rooms
            .iter()
            .filter(|room| room.has_participant(&participant_id))
            .map(|room| Self::summary(&room))
            .collect();
        rooms.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rooms)
    }

    async fn append_message(
        &self,
        room_id: ObjectId,
        sender_id: ObjectId,
        content: &str,
    ) -> ChatResult<Message> {
        let draft = validate_content(content)?;
        let mut room = self.rooms.get_mut(&room_id).ok_or(ChatError::RoomNotFound)?;
        if !room.has_participant(&sender_id) {
            return Err(ChatError::NotAParticipant);
        }

        let message = Message::new(sender_id, draft);
        room.updated_at = message.created_at;
        room.messages.push(message.clone());
        Ok(message)
    }

    async fn mark_read(&self, room_id: ObjectId, message_id: ObjectId) -> ChatResult<()> {
        let mut room = self.rooms.get_mut(&room_id).ok_or(ChatError::RoomNotFound)?;
        let message = room
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or(ChatError::MessageNotFound)?;
        message.read = true;
        Ok(())
    }

    async fn history(&self, room_id: ObjectId) -> ChatResult<Vec<Message>> {
        self.rooms
            .get(&room_id)
            .map(|room| room.messages.clone())
            .ok_or(ChatError::RoomNotFound)
    }

    async fn mark_all_read(&self, room_id: ObjectId, reader_id: ObjectId) -> ChatResult<u64> {
        let mut room = self.rooms.get_mut(&room_id).ok_or(ChatError::RoomNotFound)?;
        let mut changed = 0;
        for message in room.messages.iter_mut() {
            if !message.read && message.sender_id != reader_id {
                message.read = true;
                changed += 1;
            }
        }
        if changed > 0 {
            room.updated_at = DateTime::now();
        }
        Ok(changed)
    }
}
