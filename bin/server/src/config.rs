//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables with `__` as
//! the nesting separator (e.g. `DISCORD__REDIRECT_URI`, `STORE__BACKEND`).
//!
//! See [`ProviderConfig`](gatehouse_platform_access::ProviderConfig) for the
//! Discord identity-provider settings.

use gatehouse_platform_access::{AllowList, DiscordSettings, ProviderConfig};
use serde::Deserialize;
use std::path::PathBuf;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Where sessions, settings and the allow-list are persisted.
    #[serde(default)]
    pub store: StoreConfig,

    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Discord identity-provider configuration.
    pub discord: ProviderConfig,

    /// Values used to seed an unconfigured store on startup.
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

/// Persistence backend selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// A single JSON document on local disk.
    File {
        #[serde(default = "default_store_path")]
        path: PathBuf,
    },
    /// PostgreSQL tables managed by this service's migrations.
    Postgres {
        database_url: String,
        #[serde(default = "default_max_connections")]
        max_connections: u32,
    },
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/gatehouse.json")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::File {
            path: default_store_path(),
        }
    }
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Session duration in minutes.
    #[serde(default = "default_session_duration_minutes")]
    pub duration_minutes: i64,

    /// Interval between session cleanup runs, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

fn default_session_duration_minutes() -> i64 {
    480
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

fn default_secure_cookies() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_minutes: default_session_duration_minutes(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
            secure_cookies: default_secure_cookies(),
        }
    }
}

/// Initial Discord settings and allow-list, applied only when the store has
/// no client id yet.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Discord user ids, comma or newline separated.
    #[serde(default)]
    pub allowed_admins: Option<String>,
}

impl BootstrapConfig {
    /// Returns the settings to seed, if a client id was provided.
    #[must_use]
    pub fn settings(&self) -> Option<DiscordSettings> {
        let settings = DiscordSettings {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            guild_id: self.guild_id.clone(),
        };
        settings.is_configured().then_some(settings)
    }

    /// Returns the allow-list to seed.
    #[must_use]
    pub fn allow_list(&self) -> AllowList {
        self.allowed_admins
            .as_deref()
            .map(AllowList::parse_lines)
            .unwrap_or_default()
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(
            config::Environment::default()
                .separator("__")
                .try_parsing(true),
        )
    }

    fn from_source<S>(source: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        config::Environment::default()
            .separator("__")
            .try_parsing(true)
            .source(Some(map))
    }

    #[test]
    fn session_config_has_correct_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.duration_minutes, 480);
        assert_eq!(config.cleanup_interval_seconds, 300);
        assert!(config.secure_cookies);
    }

    #[test]
    fn minimal_environment_uses_file_store() {
        let config = ServerConfig::from_source(env(&[(
            "DISCORD__REDIRECT_URI",
            "https://example.com/auth/callback",
        )]))
        .expect("config");

        assert_eq!(config.listen_addr, "127.0.0.1:3000");
        assert_eq!(config.discord.redirect_uri(), "https://example.com/auth/callback");
        assert!(matches!(config.store, StoreConfig::File { .. }));
        assert!(config.bootstrap.settings().is_none());
    }

    #[test]
    fn postgres_backend_is_selected_by_tag() {
        let config = ServerConfig::from_source(env(&[
            ("DISCORD__REDIRECT_URI", "https://example.com/auth/callback"),
            ("STORE__BACKEND", "postgres"),
            ("STORE__DATABASE_URL", "postgres://localhost/gatehouse"),
        ]))
        .expect("config");

        match config.store {
            StoreConfig::Postgres {
                database_url,
                max_connections,
            } => {
                assert_eq!(database_url, "postgres://localhost/gatehouse");
                assert_eq!(max_connections, 5);
            }
            other => panic!("unexpected store config {other:?}"),
        }
    }

    #[test]
    fn bootstrap_parses_allow_list() {
        let bootstrap = BootstrapConfig {
            client_id: Some("app".to_string()),
            allowed_admins: Some("111, 222".to_string()),
            ..Default::default()
        };

        assert_eq!(
            bootstrap.settings().and_then(|s| s.client_id),
            Some("app".to_string())
        );
        assert_eq!(bootstrap.allow_list().iter().collect::<Vec<_>>(), vec!["111", "222"]);
    }

    #[test]
    fn missing_redirect_uri_is_an_error() {
        assert!(ServerConfig::from_source(env(&[])).is_err());
    }
}
