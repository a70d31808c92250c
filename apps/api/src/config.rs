//! Server configuration.
//!
//! Loaded from an optional `tienda.toml` next to the binary, overridable
//! with `TIENDA_`-prefixed environment variables
//! (`TIENDA_BIND_ADDR`, `TIENDA_DATABASE_PATH`, ...).

use serde::Deserialize;

use crate::auth::Role;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Listen address, e.g. `0.0.0.0:8080`.
    pub bind_addr: String,

    /// SQLite database file path.
    pub database_path: String,

    pub max_connections: u32,

    /// Static bearer tokens. A real deployment swaps the provider; these
    /// feed [`crate::auth::StaticAuthProvider`].
    pub tokens: Vec<StaticToken>,
}

/// One pre-shared bearer token and the identity it resolves to.
#[derive(Debug, Clone, Deserialize)]
pub struct StaticToken {
    pub token: String,
    pub user_id: String,
    pub role: Role,
    pub home_store_id: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            bind_addr: "127.0.0.1:8080".to_string(),
            database_path: "tienda.db".to_string(),
            max_connections: 5,
            tokens: Vec::new(),
        }
    }
}

impl ApiConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("tienda").required(false))
            .add_source(config::Environment::with_prefix("TIENDA"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ApiConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.max_connections, 5);
        assert!(config.tokens.is_empty());
    }
}
