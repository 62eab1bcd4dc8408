use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// `AppConfig` holds all configuration parameters of the coffee-shop backend.
///
/// Values come from environment variables (optionally via a `.env` file),
/// falling back to defaults suitable for a local run. `DB_HOST` sets
/// `db_host`, `HTTP_PORT` sets `http_port`, and so on.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AppConfig {
    // --- Database settings ---
    /// Database hostname or service name (e.g. "postgres" in Docker Compose).
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    /// Maximum number of pooled connections.
    pub db_pool_size: usize,
    /// Directory with the `.sql` migrations, applied in file name order.
    pub migrations_dir: String,

    // --- HTTP server ---
    pub http_port: u16,

    /// Graceful shutdown timeout (human-friendly format, e.g. "5s", "1m").
    #[serde(deserialize_with = "deserialize_duration")]
    pub shutdown_timeout: Duration,
}

/// Accepts human-readable durations like "5s" or "1m".
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let val = String::deserialize(deserializer)?;
    humantime::parse_duration(&val)
        .map_err(|e| D::Error::custom(format!("Invalid duration '{val}': {e}")))
}

impl AppConfig {
    /// Loads configuration from environment variables (and optionally from `.env` file).
    ///
    /// # Errors
    /// Returns an error if a variable is set to a value of the wrong type.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env(config::Environment::default())
    }

    /// Defaults overlaid with the variables of `env`.
    ///
    /// `env` may be given an explicit variable map with
    /// [`config::Environment::source`] instead of reading the process
    /// environment.
    pub fn from_env(env: config::Environment) -> Result<Self> {
        let settings = config::Config::builder()
            // Database
            .set_default("db_host", "localhost")?
            .set_default("db_port", 5432)?
            .set_default("db_user", "coffee_user")?
            .set_default("db_password", "securepassword")?
            .set_default("db_name", "coffee_db")?
            .set_default("db_pool_size", 16)?
            .set_default("migrations_dir", "migrations")?
            // HTTP
            .set_default("http_port", 8081)?
            // Shutdown
            .set_default("shutdown_timeout", "5s")?
            .add_source(env.try_parsing(true))
            .build()?;

        settings
            .try_deserialize()
            .context("Failed to load configuration")
    }

    /// Connection string in the key/value form understood by `tokio-postgres`.
    pub fn db_dsn(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={} sslmode=disable",
            self.db_host, self.db_port, self.db_user, self.db_password, self.db_name
        )
    }
}
