use bson::oid::ObjectId;
use fieldchat_config::{DatabaseSettings, Settings, StoreBackend};
use fieldchat_services::dao::RoomDao;
use mongodb::Database;

/// Throwaway database on the server named by `FIELDCHAT_TEST_MONGO_URI`
/// (default `mongodb://localhost:27017`), with the production indexes.
pub struct TestDb {
    pub settings: DatabaseSettings,
    pub db: Database,
}

impl TestDb {
    pub async fn new() -> Self {
        let settings = DatabaseSettings {
            backend: StoreBackend::Mongo,
            uri: std::env::var("FIELDCHAT_TEST_MONGO_URI")
                .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            name: format!("fieldchat_test_{}", ObjectId::new().to_hex()),
        };
        let db = fieldchat_db::connect(&settings).await.unwrap();
        fieldchat_db::indexes::ensure_indexes(&db)
            .await
            .expect("MongoDB reachable");
        Self { settings, db }
    }

    pub fn store(&self) -> RoomDao {
        RoomDao::new(&self.db)
    }

    /// App settings pointing at this database.
    pub fn app_settings(&self) -> Settings {
        Settings {
            database: self.settings.clone(),
            ..Settings::default()
        }
    }

    pub async fn cleanup(self) {
        self.db.drop().await.unwrap();
    }
}
