//! Authentication module for the gatehouse server.
//!
//! This module provides:
//! - The Discord OAuth2 client (code and implicit flows)
//! - Login, callback, token relay and logout routes
//! - The PostgreSQL store backend
//! - Authentication extractors for Axum routes
//!
//! # Authorization Model
//!
//! Holding a session means holding admin access. A session is only created
//! when the Discord identity's id was on the allow-list at login time; later
//! allow-list edits take effect on the next login (or session expiry).

pub mod db;
pub mod discord;
pub mod middleware;
pub mod routes;

use crate::config::SessionConfig;
use gatehouse_platform_access::AuthorizationGate;

pub use db::PgStore;
pub use discord::{DiscordClient, DiscordClientError};
pub use middleware::{AuthRejection, RequireAdmin};
pub use routes::{callback, login, logout, me, token};

/// Session cookie name.
pub(crate) const SESSION_COOKIE: &str = "admin_session";

/// Login state cookie name (CSRF protection during the Discord redirect).
pub(crate) const LOGIN_STATE_COOKIE: &str = "login_state";

/// Shared application state.
pub struct AppState {
    /// The authorization gate and its store.
    pub gate: AuthorizationGate,
    /// Session configuration.
    pub session_config: SessionConfig,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(gate: AuthorizationGate, session_config: SessionConfig) -> Self {
        Self {
            gate,
            session_config,
        }
    }
}
