pub mod chat;
pub mod dao;
pub mod error;

pub use chat::ChatHub;
pub use error::{ChatError, ChatResult};
