use std::sync::Arc;

use fieldchat_config::{Settings, StoreBackend};
use fieldchat_services::{ChatHub, chat::MemoryChatStore, dao::RoomDao};
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub chat: ChatHub,
}

impl AppState {
    /// Builds the chat subsystem on the configured store backend.
    pub async fn from_settings(settings: Settings) -> Result<Self, mongodb::error::Error> {
        let chat = match settings.database.backend {
            StoreBackend::Mongo => {
                let db = fieldchat_db::connect(&settings.database).await?;
                fieldchat_db::indexes::ensure_indexes(&db).await?;
                ChatHub::new(Arc::new(RoomDao::new(&db)))
            }
            StoreBackend::Memory => {
                info!("Using in-memory message store; history will not survive restarts");
                ChatHub::new(Arc::new(MemoryChatStore::new()))
            }
        };
        Ok(Self::with_hub(settings, chat))
    }

    pub fn with_hub(settings: Settings, chat: ChatHub) -> Self {
        Self {
            settings: Arc::new(settings),
            chat,
        }
    }
}
