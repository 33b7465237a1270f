//! Process settings from environment (`.env` honoured via dotenvy).

use crate::error::ConfigError;

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// PostgreSQL URL for the transactional row store.
    pub oltp_url: String,
    pub oltp_max_connections: u32,
    /// ClickHouse HTTP endpoint for the analytical store.
    pub olap_url: String,
    pub olap_database: String,
    pub olap_user: Option<String>,
    pub olap_password: Option<String>,
    pub bind_addr: String,
}

impl Settings {
    /// Load from process environment, reading `.env` first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary lookup; missing keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let oltp_max_connections = match lookup("OLTP_MAX_CONNECTIONS") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::Settings(format!("OLTP_MAX_CONNECTIONS must be a number, got '{}'", v)))?,
            None => 10,
        };
        Ok(Settings {
            oltp_url: get("DATABASE_OLTP_URL", "postgres://localhost/crudkit"),
            oltp_max_connections,
            olap_url: get("DATABASE_OLAP_URL", "http://localhost:8123"),
            olap_database: get("OLAP_DATABASE", "crudkit"),
            olap_user: lookup("OLAP_USER").filter(|s| !s.is_empty()),
            olap_password: lookup("OLAP_PASSWORD").filter(|s| !s.is_empty()),
            bind_addr: get("BIND_ADDR", "0.0.0.0:3000"),
        })
    }
}
