use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use stash_common::StorageConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    /// Origins allowed to call the API from a browser. Empty means none.
    pub allow_origins: Vec<String>,
    /// Preflight cache lifetime in seconds.
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// HS256 signing key for bearer tokens.
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Defaults, then `config/config.toml` if present, then `STASH__*`
    /// environment variables (e.g. `STASH__STORAGE__MAX_BYTES`).
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            .set_default("auth.token_ttl_hours", 24 * 7)?
            .add_source(File::with_name("config/config").required(false))
            .add_source(Environment::with_prefix("STASH").separator("__"))
            .build()?
            .try_deserialize()?;

        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Message("auth.jwt_secret must not be empty".into()));
        }
        if self.auth.token_ttl_hours <= 0 {
            return Err(ConfigError::Message("auth.token_ttl_hours must be positive".into()));
        }
        if self.storage.max_upload_size == 0 {
            return Err(ConfigError::Message("storage.max_upload_size must be positive".into()));
        }
        Ok(())
    }
}
