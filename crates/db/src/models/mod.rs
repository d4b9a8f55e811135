pub mod chat_room;
pub mod message;

pub use chat_room::{ChatRoom, RoomKey};
pub use message::{MAX_CONTENT_CHARS, Message, MessageDraft};
