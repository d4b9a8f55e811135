use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

use super::Message;

/// A conversation between one client and one technician about one intervention.
/// Messages are embedded in insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRoom {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub client_id: ObjectId,
    pub technician_id: ObjectId,
    pub intervention_id: ObjectId,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl ChatRoom {
    pub const COLLECTION: &'static str = "chat_rooms";

    pub fn new(key: RoomKey) -> Self {
        let now = DateTime::now();
        Self {
            id: None,
            client_id: key.client_id,
            technician_id: key.technician_id,
            intervention_id: key.intervention_id,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> RoomKey {
        RoomKey {
            client_id: self.client_id,
            technician_id: self.technician_id,
            intervention_id: self.intervention_id,
        }
    }

    pub fn has_participant(&self, participant_id: &ObjectId) -> bool {
        self.key().has_participant(participant_id)
    }
}

/// The business triple identifying a room. At most one room exists per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomKey {
    pub client_id: ObjectId,
    pub technician_id: ObjectId,
    pub intervention_id: ObjectId,
}

impl RoomKey {
    pub fn new(client_id: ObjectId, technician_id: ObjectId, intervention_id: ObjectId) -> Self {
        Self {
            client_id,
            technician_id,
            intervention_id,
        }
    }

    pub fn has_participant(&self, participant_id: &ObjectId) -> bool {
        self.client_id == *participant_id || self.technician_id == *participant_id
    }

    pub fn to_filter(&self) -> bson::Document {
        bson::doc! {
            "client_id": self.client_id,
            "technician_id": self.technician_id,
            "intervention_id": self.intervention_id,
        }
    }
}
