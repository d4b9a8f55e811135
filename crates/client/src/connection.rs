use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::time::Duration;

use dashmap::DashMap;
use fieldchat_protocol::{ClientEvent, MessagePayload, ServerEvent};
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{config::ClientConfig, error::ClientError};

/// Handle returned by `on_message`/`on_typing`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingEvent {
    pub room_id: String,
    pub sender_id: String,
    pub is_typing: bool,
}

type MessageHandler = Arc<dyn Fn(&MessagePayload) + Send + Sync>;
type TypingHandler = Arc<dyn Fn(&TypingEvent) + Send + Sync>;
type Pending = DashMap<String, oneshot::Sender<ServerEvent>>;

#[derive(Default)]
struct Subscribers {
    next_id: AtomicU64,
    messages: RwLock<Vec<(SubscriptionId, MessageHandler)>>,
    typing: RwLock<Vec<(SubscriptionId, TypingHandler)>>,
}

impl Subscribers {
    fn next(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn emit_message(&self, message: &MessagePayload) {
        // Snapshot so a handler may (un)subscribe without deadlocking.
        let handlers: Vec<MessageHandler> =
            self.messages.read().iter().map(|(_, h)| h.clone()).collect();
        for handler in handlers {
            handler(message);
        }
    }

    fn emit_typing(&self, event: &TypingEvent) {
        let handlers: Vec<TypingHandler> =
            self.typing.read().iter().map(|(_, h)| h.clone()).collect();
        for handler in handlers {
            handler(event);
        }
    }
}

/// A live session with the chat server.
///
/// Inbound events are delivered to every registered handler, in the order
/// the server sent them, for as long as the connection is open. Handlers
/// registered later do not see earlier events; fetch history over REST.
pub struct Connection {
    session_id: String,
    request_timeout: Duration,
    outgoing: mpsc::UnboundedSender<WsMessage>,
    pending: Arc<Pending>,
    subscribers: Arc<Subscribers>,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// Opens a session against `endpoint` (e.g. `ws://host:port`).
///
/// Fails with [`ClientError::Connection`] if the handshake or the server's
/// `connected` frame does not arrive within `config.connect_timeout`.
pub async fn connect(endpoint: &str, config: ClientConfig) -> Result<Connection, ClientError> {
    let url = format!(
        "{}/ws?{}",
        endpoint.trim_end_matches('/'),
        config.connect_params().to_query()
    );

    let handshake = async {
        let (socket, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;
        let (sink, mut stream) = socket.split();

        let session_id = loop {
            match stream.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    match serde_json::from_str::<ServerEvent>(text.as_str()) {
                        Ok(ServerEvent::Connected { session_id }) => break session_id,
                        Ok(other) => {
                            return Err(ClientError::Connection(format!(
                                "unexpected first frame: {other:?}"
                            )));
                        }
                        Err(e) => return Err(ClientError::Connection(e.to_string())),
                    }
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(ClientError::Connection(e.to_string())),
                None => {
                    return Err(ClientError::Connection(
                        "closed before session was assigned".to_string(),
                    ));
                }
            }
        };
        Ok((sink, stream, session_id))
    };

    let (mut sink, mut stream, session_id) = tokio::time::timeout(config.connect_timeout, handshake)
        .await
        .map_err(|_| {
            ClientError::Connection(format!(
                "no session within {:?}",
                config.connect_timeout
            ))
        })??;

    info!(%session_id, participant_id = %config.participant_id, "Connected to chat server");

    let (outgoing, mut queue) = mpsc::unbounded_channel::<WsMessage>();
    let writer = tokio::spawn(async move {
        while let Some(frame) = queue.recv().await {
            let closing = matches!(frame, WsMessage::Close(_));
            if let Err(e) = sink.send(frame).await {
                debug!(%e, "WS send failed, stopping writer");
                break;
            }
            if closing {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let pending: Arc<Pending> = Arc::new(DashMap::new());
    let subscribers = Arc::new(Subscribers::default());
    let closed = Arc::new(AtomicBool::new(false));

    let reader = {
        let pending = pending.clone();
        let subscribers = subscribers.clone();
        let closed = closed.clone();
        let session_id = session_id.clone();
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => {
                        match serde_json::from_str::<ServerEvent>(text.as_str()) {
                            Ok(event) => route(event, &pending, &subscribers),
                            Err(e) => warn!(%session_id, %e, "Unreadable server frame"),
                        }
                    }
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(%session_id, %e, "WebSocket error");
                        break;
                    }
                }
            }
            closed.store(true, Ordering::SeqCst);
            // Dropping the senders fails every outstanding request with Closed.
            pending.clear();
            debug!(%session_id, "Reader stopped");
        })
    };

    Ok(Connection {
        session_id,
        request_timeout: config.request_timeout,
        outgoing,
        pending,
        subscribers,
        closed,
        reader,
        writer,
    })
}

fn route(event: ServerEvent, pending: &Pending, subscribers: &Subscribers) {
    match event {
        ServerEvent::ReceiveMessage { message } => subscribers.emit_message(&message),
        ServerEvent::UserTyping {
            room_id,
            sender_id,
            is_typing,
        } => subscribers.emit_typing(&TypingEvent {
            room_id,
            sender_id,
            is_typing,
        }),
        ServerEvent::Pong | ServerEvent::Connected { .. } => {}
        reply => {
            let Some(request_id) = reply.request_id().map(str::to_string) else {
                warn!(?reply, "Uncorrelated server reply");
                return;
            };
            if let Some((_, waiter)) = pending.remove(&request_id) {
                let _ = waiter.send(reply);
            }
        }
    }
}

impl Connection {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn on_message<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&MessagePayload) + Send + Sync + 'static,
    {
        let id = self.subscribers.next();
        self.subscribers.messages.write().push((id, Arc::new(handler)));
        id
    }

    pub fn on_typing<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&TypingEvent) + Send + Sync + 'static,
    {
        let id = self.subscribers.next();
        self.subscribers.typing.write().push((id, Arc::new(handler)));
        id
    }

    /// Removes a message or typing handler. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut removed = false;
        self.subscribers.messages.write().retain(|(sid, _)| {
            let keep = *sid != id;
            removed |= !keep;
            keep
        });
        self.subscribers.typing.write().retain(|(sid, _)| {
            let keep = *sid != id;
            removed |= !keep;
            keep
        });
        removed
    }

    pub async fn join_room(&self, room_id: &str) -> Result<(), ClientError> {
        let request_id = new_request_id();
        let event = ClientEvent::JoinRoom {
            request_id: Some(request_id.clone()),
            room_id: room_id.to_string(),
        };
        match self.request(request_id, &event).await? {
            ServerEvent::Joined { .. } => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn leave_room(&self, room_id: &str) -> Result<(), ClientError> {
        let request_id = new_request_id();
        let event = ClientEvent::LeaveRoom {
            request_id: Some(request_id.clone()),
            room_id: room_id.to_string(),
        };
        match self.request(request_id, &event).await? {
            ServerEvent::Left { .. } => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Sends a message to a joined room and returns it as stored.
    pub async fn send(&self, room_id: &str, content: &str) -> Result<MessagePayload, ClientError> {
        let request_id = new_request_id();
        let event = ClientEvent::SendMessage {
            request_id: Some(request_id.clone()),
            room_id: room_id.to_string(),
            content: content.to_string(),
        };
        match self.request(request_id, &event).await? {
            ServerEvent::MessageSent { message, .. } => Ok(message),
            other => Err(unexpected(other)),
        }
    }

    /// Signals typing state to the other members of the room. Best-effort.
    pub fn send_typing(&self, room_id: &str, is_typing: bool) -> Result<(), ClientError> {
        self.push(&ClientEvent::UserTyping {
            room_id: room_id.to_string(),
            is_typing,
        })
    }

    /// Closes the session. The server drops it from its room.
    pub async fn disconnect(self) {
        let _ = self.outgoing.send(WsMessage::Close(None));
        if tokio::time::timeout(Duration::from_secs(2), self.writer)
            .await
            .is_err()
        {
            debug!(session_id = %self.session_id, "Writer did not finish in time");
        }
        self.reader.abort();
        self.closed.store(true, Ordering::SeqCst);
        info!(session_id = %self.session_id, "Disconnected from chat server");
    }

    fn push(&self, event: &ClientEvent) -> Result<(), ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        let text = serde_json::to_string(event).map_err(|e| ClientError::Connection(e.to_string()))?;
        self.outgoing
            .send(WsMessage::text(text))
            .map_err(|_| ClientError::Closed)
    }

    async fn request(&self, request_id: String, event: &ClientEvent) -> Result<ServerEvent, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id.clone(), tx);

        if let Err(e) = self.push(event) {
            self.pending.remove(&request_id);
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Err(_) => {
                self.pending.remove(&request_id);
                Err(ClientError::Connection(format!(
                    "no reply within {:?}",
                    self.request_timeout
                )))
            }
            Ok(Err(_)) => Err(ClientError::Closed),
            Ok(Ok(ServerEvent::Error { code, message, .. })) => {
                Err(ClientError::Rejected { code, message })
            }
            Ok(Ok(reply)) => Ok(reply),
        }
    }
}

fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

fn unexpected(event: ServerEvent) -> ClientError {
    ClientError::Connection(format!("unexpected reply: {event:?}"))
}
