//! Connector used by the client and technician apps.
//!
//! ```no_run
//! # async fn demo() -> Result<(), fieldchat_client::ClientError> {
//! use fieldchat_client::{ClientConfig, ParticipantKind, connect};
//!
//! let config = ClientConfig::new("65f0c0ffee0000000000beef", ParticipantKind::Technician);
//! let conn = connect("ws://localhost:5001", config).await?;
//! conn.on_message(|msg| println!("{}: {}", msg.sender_id, msg.content));
//! conn.join_room("65f0c0ffee0000000000cafe").await?;
//! conn.send("65f0c0ffee0000000000cafe", "On my way").await?;
//! conn.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;

pub use config::ClientConfig;
pub use connection::{Connection, SubscriptionId, TypingEvent, connect};
pub use error::ClientError;
pub use fieldchat_protocol::{ErrorCode, MessagePayload, ParticipantKind};
