use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub backend: StoreBackend,
    pub uri: String,
    pub name: String,
}

/// Where chat rooms and their messages are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Mongo,
    /// Process-local store; history is lost on restart. Used by tests and demos.
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogSettings {
    #[serde(default)]
    pub json: bool,
}

impl Settings {
    /// Loads settings from built-in defaults, `config/default.toml`,
    /// `config/{FIELDCHAT_ENV}.toml` and `FIELDCHAT__*` environment variables,
    /// later sources overriding earlier ones.
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("FIELDCHAT_ENV").unwrap_or_else(|_| "development".to_string());

        Config::builder()
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 5001)?
            .set_default("database.backend", "mongo")?
            .set_default("database.uri", "mongodb://localhost:27017")?
            .set_default("database.name", "fieldchat")?
            .set_default("log.json", false)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{env}")).required(false))
            .add_source(Environment::with_prefix("FIELDCHAT").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.app.host, self.app.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app: AppSettings {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: DatabaseSettings {
                backend: StoreBackend::Memory,
                uri: "mongodb://localhost:27017".to_string(),
                name: "fieldchat".to_string(),
            },
            log: LogSettings::default(),
        }
    }
}
