pub mod indexes;
pub mod models;

use fieldchat_config::DatabaseSettings;
use mongodb::{Client, Database};
use tracing::info;

/// Opens a client against `settings.uri` and returns the configured database.
/// The driver connects lazily, so this only fails on a malformed URI.
pub async fn connect(settings: &DatabaseSettings) -> Result<Database, mongodb::error::Error> {
    let client = Client::with_uri_str(&settings.uri).await?;
    info!(database = %settings.name, "MongoDB client ready");
    Ok(client.database(&settings.name))
}
