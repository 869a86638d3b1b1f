//! Hospital management backend core library
//!
//! Role-based accounts, appointment scheduling, invoicing, prescriptions
//! and a cached admin dashboard over a relational store.

pub mod api;
pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod telemetry;

/// Application configuration
pub mod config {
    use serde::Deserialize;

    #[derive(Debug, Clone, Deserialize)]
    pub struct Config {
        pub server: ServerConfig,
        pub database: DatabaseConfig,
        pub auth: AuthConfig,
        pub cache: CacheConfig,
        pub logging: LoggingConfig,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ServerConfig {
        pub host: String,
        pub port: u16,
        #[serde(default)]
        pub allowed_origins: Vec<String>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct DatabaseConfig {
        pub url: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct AuthConfig {
        #[serde(default)]
        pub jwt_secret: String,
        pub access_token_minutes: i64,
        pub refresh_token_days: i64,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct CacheConfig {
        pub dashboard_ttl_secs: u64,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct LoggingConfig {
        pub level: String,
        /// "pretty" or "json"
        pub format: String,
    }

    /// Load configuration from file
    pub fn load_config() -> Result<Config, config::ConfigError> {
        let env = std::env::var("HOSPITAL_ENV").unwrap_or_else(|_| "development".into());

        config::Config::builder()
            // Start with built-in defaults
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8000)?
            .set_default("database.url", "sqlite://hospital.db")?
            .set_default("auth.access_token_minutes", 60)?
            .set_default("auth.refresh_token_days", 1)?
            .set_default("cache.dashboard_ttl_secs", 300)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Then the default file, then environment-specific settings
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            // Override with environment variables, e.g. HOSPITAL_AUTH__JWT_SECRET
            .add_source(config::Environment::with_prefix("HOSPITAL").separator("__"))
            .build()?
            .try_deserialize()
    }
}
