//! # configs
//!
//! Layered application settings: built-in defaults, then
//! `config/default.*`, then `config/{TANICARE_ENV}.*`, then environment
//! variables such as `TANICARE__SERVER__PORT=9000`.

use std::path::Path;

use config::{Config, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

/// Placeholder secret shipped in the defaults; refused outside development.
pub const DEV_JWT_SECRET: &str = "tanicare-development-secret-change-me";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub environment: String,
    pub server: ServerSettings,
    pub regions: RegionSettings,
    pub store: StoreSettings,
    pub media: MediaSettings,
    pub auth: AuthSettings,
    pub log: LogSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct RegionSettings {
    /// Two-column `code,name` file loaded at startup
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Deserialize)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub sqlite_url: String,
}

#[derive(Debug, Deserialize)]
pub struct MediaSettings {
    /// Directory uploads are written under
    pub root: String,
    /// Public URL prefix the directory is served from
    pub url_prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: SecretString,
    pub token_ttl_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct LogSettings {
    pub json: bool,
}

impl Settings {
    /// Loads `.env`, then the layered sources rooted at `./config`.
    pub fn load() -> Result<Self, SettingsError> {
        dotenvy::dotenv().ok();
        let environment =
            std::env::var("TANICARE_ENV").unwrap_or_else(|_| "development".to_string());
        Self::load_from(Path::new("config"), &environment)
    }

    pub fn load_from(config_dir: &Path, environment: &str) -> Result<Self, SettingsError> {
        let settings: Settings = Config::builder()
            .set_default("environment", environment)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("regions.path", "data/wilayah.csv")?
            .set_default("store.backend", "memory")?
            .set_default("store.sqlite_url", "sqlite://tanicare.db")?
            .set_default("media.root", "./data/uploads")?
            .set_default("media.url_prefix", "/static/uploads")?
            .set_default("auth.jwt_secret", DEV_JWT_SECRET)?
            .set_default("auth.token_ttl_secs", 7 * 24 * 60 * 60)?
            .set_default("log.json", false)?
            .add_source(File::with_name(&config_dir.join("default").to_string_lossy()).required(false))
            .add_source(
                File::with_name(&config_dir.join(environment).to_string_lossy()).required(false),
            )
            .add_source(Environment::with_prefix("TANICARE").separator("__").try_parsing(true))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.auth.token_ttl_secs == 0 {
            return Err(SettingsError::Invalid("auth.token_ttl_secs must be positive".into()));
        }
        let secret = self.auth.jwt_secret.expose_secret();
        if secret.len() < 16 {
            return Err(SettingsError::Invalid(
                "auth.jwt_secret must be at least 16 bytes".into(),
            ));
        }
        if self.uses_development_secret() && self.environment == "production" {
            return Err(SettingsError::Invalid(
                "auth.jwt_secret must be set in production".into(),
            ));
        }
        Ok(())
    }

    pub fn uses_development_secret(&self) -> bool {
        self.auth.jwt_secret.expose_secret() == DEV_JWT_SECRET
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
