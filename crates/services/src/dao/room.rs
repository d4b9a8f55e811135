use async_trait::async_trait;
use bson::{DateTime, doc, oid::ObjectId};
use fieldchat_db::models::{ChatRoom, Message, RoomKey};
use mongodb::{
    Database,
    options::{FindOneAndUpdateOptions, FindOneOptions, ReturnDocument},
};
use tracing::{debug, info};

use super::base::{BaseDao, is_duplicate_key};
use crate::chat::store::{MessageStore, validate_content};
use crate::error::{ChatError, ChatResult};

/// MongoDB-backed message store. Each room is one document embedding its
/// messages as an ordered array.
pub struct RoomDao {
    pub base: BaseDao<ChatRoom>,
}

impl RoomDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, ChatRoom::COLLECTION),
        }
    }

    fn without_messages() -> bson::Document {
        doc! { "messages": 0 }
    }

    fn participant_filter(room_id: ObjectId, participant_id: ObjectId) -> bson::Document {
        doc! {
            "_id": room_id,
            "$or": [
                { "client_id": participant_id },
                { "technician_id": participant_id },
            ],
        }
    }

    async fn find_by_key(&self, key: &RoomKey) -> ChatResult<Option<ChatRoom>> {
        let opts = FindOneOptions::builder()
            .projection(Self::without_messages())
            .build();
        Ok(self
            .base
            .collection()
            .find_one(key.to_filter())
            .with_options(opts)
            .await?)
    }

    /// Distinguishes a missing room from a failed secondary condition after
    /// an update matched nothing.
    async fn missing(&self, room_id: ObjectId, otherwise: ChatError) -> ChatError {
        match self.base.exists(room_id).await {
            Ok(true) => otherwise,
            Ok(false) => ChatError::RoomNotFound,
            Err(e) => e,
        }
    }
}

#[async_trait]
impl MessageStore for RoomDao {
    async fn create_room(&self, key: RoomKey) -> ChatResult<ChatRoom> {
        let mut room = ChatRoom::new(key);
        match self.base.insert_one(&room).await {
            Ok(id) => {
                info!(room_id = %id, "Chat room created");
                room.id = Some(id);
                Ok(room)
            }
            Err(ChatError::Mongo(e)) if is_duplicate_key(&e) => Err(ChatError::DuplicateRoom),
            Err(e) => Err(e),
        }
    }

    async fn find_or_create_room(&self, key: RoomKey) -> ChatResult<ChatRoom> {
        let now = DateTime::now();
        let opts = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .projection(Self::without_messages())
            .build();

        let upserted = self
            .base
            .collection()
            .find_one_and_update(
                key.to_filter(),
                doc! {
                    "$setOnInsert": {
                        "messages": [],
                        "created_at": now,
                        "updated_at": now,
                    }
                },
            )
            .with_options(opts)
            .await;

        match upserted {
            Ok(Some(room)) => Ok(room),
            // Lost an upsert race against the unique index; the winner's room exists now.
            Ok(None) => self.find_by_key(&key).await?.ok_or(ChatError::RoomNotFound),
            Err(e) if is_duplicate_key(&e) => {
                debug!("Concurrent room upsert, reading existing room");
                self.find_by_key(&key).await?.ok_or(ChatError::RoomNotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_room(&self, room_id: ObjectId) -> ChatResult<ChatRoom> {
        let opts = FindOneOptions::builder()
            .projection(Self::without_messages())
            .build();
        self.base
            .collection()
            .find_one(doc! { "_id": room_id })
            .with_options(opts)
            .await?
            .ok_or(ChatError::RoomNotFound)
    }

    async fn find_rooms_for_participant(&self, participant_id: ObjectId) -> ChatResult<Vec<ChatRoom>> {
        self.base
            .find_many(
                doc! {
                    "$or": [
                        { "client_id": participant_id },
                        { "technician_id": participant_id },
                    ]
                },
                Some(doc! { "updated_at": -1 }),
                Some(Self::without_messages()),
            )
            .await
    }

    async fn append_message(
        &self,
        room_id: ObjectId,
        sender_id: ObjectId,
        content: &str,
    ) -> ChatResult<Message> {
        let draft = validate_content(content)?;
        let message = Message::new(sender_id, draft);

        let result = self
            .base
            .update_one(
                Self::participant_filter(room_id, sender_id),
                doc! {
                    "$push": { "messages": bson::to_bson(&message)? },
                    "$set": { "updated_at": message.created_at },
                },
            )
            .await?;

        if result.matched_count == 0 {
            return Err(self.missing(room_id, ChatError::NotAParticipant).await);
        }

        Ok(message)
    }

    async fn mark_read(&self, room_id: ObjectId, message_id: ObjectId) -> ChatResult<()> {
        let result = self
            .base
            .update_one(
                doc! { "_id": room_id, "messages._id": message_id },
                doc! { "$set": { "messages.$.read": true } },
            )
            .await?;

        if result.matched_count == 0 {
            return Err(self.missing(room_id, ChatError::MessageNotFound).await);
        }
        Ok(())
    }

    async fn history(&self, room_id: ObjectId) -> ChatResult<Vec<Message>> {
        self.base
            .find_one(doc! { "_id": room_id })
            .await?
            .map(|room| room.messages)
            .ok_or(ChatError::RoomNotFound)
    }

    async fn mark_all_read(&self, room_id: ObjectId, reader_id: ObjectId) -> ChatResult<u64> {
        // Counted from the pre-image the array filter was applied to.
        let opts = FindOneAndUpdateOptions::builder()
            .array_filters(vec![doc! { "m.read": false, "m.sender_id": { "$ne": reader_id } }])
            .return_document(ReturnDocument::Before)
            .build();
        let before = self
            .base
            .collection()
            .find_one_and_update(
                doc! { "_id": room_id },
                doc! { "$set": { "messages.$[m].read": true } },
            )
            .with_options(opts)
            .await?
            .ok_or(ChatError::RoomNotFound)?;

        let changed = before
            .messages
            .iter()
            .filter(|m| !m.read && m.sender_id != reader_id)
            .count();
        Ok(changed as u64)
    }
}
