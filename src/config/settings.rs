use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

/// Prefix shared by every database environment variable.
const ENV_PREFIX: &str = "HELIOS_DB";

/// Connection settings for the PostgreSQL pool.
///
/// Sourced once from the process environment at first use:
/// `HELIOS_DB_DATABASE`, `HELIOS_DB_USERNAME`, `HELIOS_DB_PASSWORD`,
/// `HELIOS_DB_HOST`, `HELIOS_DB_PORT` and `HELIOS_DB_SCHEMA` are
/// required; `HELIOS_DB_MAX_CONNECTIONS` is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub database: String,
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub schema: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl DatabaseSettings {
    /// Read settings from the environment.
    ///
    /// A `.env` file in the working directory is honored when present.
    /// Missing or malformed required variables produce a `ConfigError`
    /// rather than a partially populated value.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        Config::builder()
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Typed connect options for the configured server.
    ///
    /// TLS is disabled and `search_path` is pinned to the configured
    /// schema on every pooled connection.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .database(&self.database)
            .ssl_mode(PgSslMode::Disable)
            .options([("search_path", self.schema.as_str())])
    }

    /// Connection URL with the password masked, safe for log lines.
    pub fn masked_url(&self) -> String {
        format!(
            "postgres://{}:***@{}:{}/{}",
            self.username, self.host, self.port, self.database
        )
    }
}
