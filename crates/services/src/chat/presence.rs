use std::collections::{HashMap, HashSet};

use bson::oid::ObjectId;
use dashmap::DashMap;
use fieldchat_protocol::{ParticipantKind, ServerEvent};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// Queue of frames waiting to be written to a session's socket.
pub type Outbox = mpsc::UnboundedSender<ServerEvent>;

/// One live connection of a client or technician app.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub participant_id: ObjectId,
    pub kind: ParticipantKind,
    pub display_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("session {0} is not connected")]
    Disconnected(String),
}

#[derive(Default)]
struct Membership {
    rooms: HashMap<ObjectId, HashSet<String>>,
    current: HashMap<String, ObjectId>,
}

impl Membership {
    fn remove(&mut self, session_id: &str) -> Option<ObjectId> {
        let room_id = self.current.remove(session_id)?;
        if let Some(members) = self.rooms.get_mut(&room_id) {
            members.remove(session_id);
            if members.is_empty() {
                self.rooms.remove(&room_id);
            }
        }
        Some(room_id)
    }
}

/// Live, non-persisted record of connected sessions and the room each one
/// occupies. A session is in at most one room at a time.
#[derive(Default)]
pub struct PresenceRegistry {
    sessions: DashMap<String, (Session, Outbox)>,
    membership: Mutex<Membership>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session: Session, outbox: Outbox) {
        self.sessions.insert(session.id.clone(), (session, outbox));
    }

    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.sessions.get(session_id).map(|entry| entry.0.clone())
    }

    /// Moves the session into `room_id`, leaving its previous room in the
    /// same step. Returns the room it left, if any.
    pub fn join(&self, session_id: &str, room_id: ObjectId) -> Option<ObjectId> {
        let mut membership = self.membership.lock();
        if membership.current.get(session_id) == Some(&room_id) {
            return None;
        }

        let previous = membership.remove(session_id);
        membership
            .rooms
            .entry(room_id)
            .or_default()
            .insert(session_id.to_string());
        membership.current.insert(session_id.to_string(), room_id);
        debug!(%session_id, %room_id, ?previous, "Session joined room");
        previous
    }

    /// Removes the session from `room_id`. Not being a member is not an error.
    pub fn leave(&self, session_id: &str, room_id: ObjectId) -> bool {
        let mut membership = self.membership.lock();
        if membership.current.get(session_id) != Some(&room_id) {
            return false;
        }
        membership.remove(session_id);
        debug!(%session_id, %room_id, "Session left room");
        true
    }

    pub fn members_of(&self, room_id: ObjectId) -> HashSet<String> {
        self.membership
            .lock()
            .rooms
            .get(&room_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn room_of(&self, session_id: &str) -> Option<ObjectId> {
        self.membership.lock().current.get(session_id).copied()
    }

    pub fn is_member(&self, session_id: &str, room_id: ObjectId) -> bool {
        self.room_of(session_id) == Some(room_id)
    }

    /// Forgets the session entirely. Returns the room it occupied.
    pub fn on_disconnect(&self, session_id: &str) -> Option<ObjectId> {
        let room_id = self.membership.lock().remove(session_id);
        self.sessions.remove(session_id);
        room_id
    }

    /// Queues `event` for one session.
    pub fn deliver(&self, session_id: &str, event: ServerEvent) -> Result<(), DeliveryError> {
        let outbox = self
            .sessions
            .get(session_id)
            .map(|entry| entry.1.clone())
            .ok_or_else(|| DeliveryError::Disconnected(session_id.to_string()))?;
        outbox
            .send(event)
            .map_err(|_| DeliveryError::Disconnected(session_id.to_string()))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
