use std::sync::Arc;

use bson::oid::ObjectId;
use dashmap::DashMap;
use fieldchat_db::models::{ChatRoom, RoomKey};
use tracing::debug;

use super::store::{MessageStore, room_id_of};
use crate::error::ChatResult;

/// Maps (client, technician, intervention) triples to room ids and back.
///
/// Room identity never changes once assigned, so resolved pairs are cached
/// for the lifetime of the process.
pub struct RoomDirectory {
    store: Arc<dyn MessageStore>,
    by_key: DashMap<RoomKey, ObjectId>,
    keys: DashMap<ObjectId, RoomKey>,
}

impl RoomDirectory {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self {
            store,
            by_key: DashMap::new(),
            keys: DashMap::new(),
        }
    }

    /// Returns the room for the triple, creating it on first use.
    pub async fn resolve_room(&self, key: RoomKey) -> ChatResult<ObjectId> {
        if let Some(id) = self.by_key.get(&key) {
            return Ok(*id);
        }

        let room = self.store.find_or_create_room(key).await?;
        let room_id = room_id_of(&room)?;
        self.remember(room_id, key);
        debug!(%room_id, "Room resolved");
        Ok(room_id)
    }

    /// The triple a room was created for.
    pub async fn participants(&self, room_id: ObjectId) -> ChatResult<RoomKey> {
        if let Some(key) = self.keys.get(&room_id) {
            return Ok(*key);
        }

        let room = self.store.find_room(room_id).await?;
        let key = room.key();
        self.remember(room_id, key);
        Ok(key)
    }

    pub async fn rooms_for(&self, participant_id: ObjectId) -> ChatResult<Vec<ChatRoom>> {
        let rooms = self.store.find_rooms_for_participant(participant_id).await?;
        for room in &rooms {
            if let Some(id) = room.id {
                self.remember(id, room.key());
            }
        }
        Ok(rooms)
    }

    fn remember(&self, room_id: ObjectId, key: RoomKey) {
        self.by_key.insert(key, room_id);
        self.keys.insert(room_id, key);
    }
}
