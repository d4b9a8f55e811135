use std::sync::Arc;

use bson::oid::ObjectId;
use dashmap::DashMap;
use fieldchat_db::models::Message;
use fieldchat_protocol::ServerEvent;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::directory::RoomDirectory;
use super::message_payload;
use super::presence::{PresenceRegistry, Session};
use super::store::MessageStore;
use crate::error::{ChatError, ChatResult};

/// Couples persistence with fan-out. Sends to one room are serialised so
/// every recipient observes messages in the order they were stored.
pub struct Dispatcher {
    store: Arc<dyn MessageStore>,
    directory: Arc<RoomDirectory>,
    presence: Arc<PresenceRegistry>,
    room_locks: DashMap<ObjectId, Arc<Mutex<()>>>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn MessageStore>,
        directory: Arc<RoomDirectory>,
        presence: Arc<PresenceRegistry>,
    ) -> Self {
        Self {
            store,
            directory,
            presence,
            room_locks: DashMap::new(),
        }
    }

    fn session(&self, session_id: &str) -> ChatResult<Session> {
        self.presence
            .session(session_id)
            .ok_or_else(|| ChatError::UnknownSession(session_id.to_string()))
    }

    fn room_lock(&self, room_id: ObjectId) -> Arc<Mutex<()>> {
        self.room_locks.entry(room_id).or_default().clone()
    }

    /// Joins an existing room the session's participant belongs to.
    pub async fn join(&self, session_id: &str, room_id: ObjectId) -> ChatResult<()> {
        let session = self.session(session_id)?;
        let key = self.directory.participants(room_id).await?;
        if !key.has_participant(&session.participant_id) {
            return Err(ChatError::NotAParticipant);
        }
        self.presence.join(session_id, room_id);
        Ok(())
    }

    pub fn leave(&self, session_id: &str, room_id: ObjectId) {
        self.presence.leave(session_id, room_id);
    }

    pub fn disconnect(&self, session_id: &str) {
        if let Some(room_id) = self.presence.on_disconnect(session_id) {
            debug!(%session_id, %room_id, "Session dropped from room on disconnect");
        }
    }

    /// Persists a message from a joined session and forwards it to every
    /// other session in the room. Delivery failures are logged per recipient
    /// and never fail the send.
    pub async fn send_message(
        &self,
        session_id: &str,
        room_id: ObjectId,
        content: &str,
    ) -> ChatResult<Message> {
        let session = self.presence.session(session_id).ok_or(ChatError::NotAMember)?;
        if !self.presence.is_member(session_id, room_id) {
            return Err(ChatError::NotAMember);
        }

        let lock = self.room_lock(room_id);
        let result = {
            let _guard = lock.lock().await;
            self.append_and_fan_out(&session, room_id, content).await
        };
        drop(lock);
        self.release_room_lock(room_id);
        result
    }

    async fn append_and_fan_out(
        &self,
        session: &Session,
        room_id: ObjectId,
        content: &str,
    ) -> ChatResult<Message> {
        // The session may have left while waiting for the lock.
        if !self.presence.is_member(&session.id, room_id) {
            return Err(ChatError::NotAMember);
        }

        let message = self
            .store
            .append_message(room_id, session.participant_id, content)
            .await?;

        let event = ServerEvent::ReceiveMessage {
            message: message_payload(room_id, &message),
        };
        self.fan_out(&session.id, room_id, event);

        Ok(message)
    }

    /// Drops the room's lock entry once no sender holds or awaits it.
    fn release_room_lock(&self, room_id: ObjectId) {
        self.room_locks
            .remove_if(&room_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Best-effort typing indicator; never persisted. Sessions outside the
    /// room are ignored.
    pub fn send_typing(&self, session_id: &str, room_id: ObjectId, is_typing: bool) {
        let Some(session) = self.presence.session(session_id) else {
            return;
        };
        if !self.presence.is_member(session_id, room_id) {
            debug!(%session_id, %room_id, "Typing from non-member ignored");
            return;
        }

        let event = ServerEvent::UserTyping {
            room_id: room_id.to_hex(),
            sender_id: session.participant_id.to_hex(),
            is_typing,
        };
        for member in self.presence.members_of(room_id) {
            if member != session_id {
                let _ = self.presence.deliver(&member, event.clone());
            }
        }
    }

    fn fan_out(&self, sender_session: &str, room_id: ObjectId, event: ServerEvent) {
        for member in self.presence.members_of(room_id) {
            if member == sender_session {
                continue;
            }
            if let Err(e) = self.presence.deliver(&member, event.clone()) {
                warn!(%room_id, recipient = %member, %e, "Dropped message fan-out");
            }
        }
    }
}
