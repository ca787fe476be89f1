//! Configuration loaded from a TOML file, one section per concern.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Deployment identity mode.
///
/// Hosted deployments sit behind an external identity provider and carry a
/// verified claims document per request. Self-hosted deployments have no
/// IdP; a server-side session cookie resolves directly to an account id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    Hosted,
    SelfHosted,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
    pub create_if_missing: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "promptgate.db".to_string(),
            max_connections: 10,
            create_if_missing: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub mode: AuthMode,
    /// Claim carrying the numeric internal account identifier.
    pub account_id_claim: String,
    /// Header the fronting verifier uses to pass the verified claims JSON.
    pub claims_header: String,
    /// Session cookie name for self-hosted deployments.
    pub session_cookie: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::Hosted,
            account_id_claim: "account_id".to_string(),
            claims_header: "x-verified-claims".to_string(),
            session_cookie: "pg_session".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UsageBufferConfig {
    /// Maximum entries per flush batch.
    pub max_size: usize,
    pub flush_interval_ms: u64,
    /// Maximum pending entries before new entries are dropped.
    pub max_pending_entries: usize,
}

impl Default for UsageBufferConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            flush_interval_ms: 1000,
            max_pending_entries: 10_000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub usage_buffer: UsageBufferConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.environment, Environment::Development);
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.auth.mode, AuthMode::Hosted);
        assert_eq!(cfg.usage_buffer.max_size, 1000);
    }

    #[test]
    fn parses_self_hosted_mode() {
        let cfg: Config = toml::from_str(
            r#"
            environment = "production"

            [auth]
            mode = "self_hosted"

            [server]
            port = 9000
            "#,
        )
        .unwrap();
        assert_eq!(cfg.environment, Environment::Production);
        assert_eq!(cfg.auth.mode, AuthMode::SelfHosted);
        assert_eq!(cfg.server.port, 9000);
    }
}
