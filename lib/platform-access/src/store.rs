//! Persistence collaborators used by the authorization gate.
//!
//! The gate only sees these traits. Which backend sits behind them (a JSON
//! file, PostgreSQL) is a deployment decision made by the server.

use async_trait::async_trait;
use gatehouse_core::{Result, SessionId};

use crate::allow_list::AllowList;
use crate::error::StoreError;
use crate::session::Session;
use crate::settings::DiscordSettings;

/// Source of truth for who may hold an administrative session.
#[async_trait]
pub trait AllowListStore: Send + Sync {
    /// Reads the current allow-list.
    ///
    /// A missing or malformed stored value yields an empty list, not an error.
    async fn load_allow_list(&self) -> Result<AllowList, StoreError>;

    /// Replaces the allow-list.
    async fn save_allow_list(&self, allow_list: &AllowList) -> Result<(), StoreError>;
}

/// Storage for the operator-entered Discord application settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Reads the settings; an unconfigured deployment yields the default.
    async fn load_settings(&self) -> Result<DiscordSettings, StoreError>;

    /// Replaces the settings.
    async fn save_settings(&self, settings: &DiscordSettings) -> Result<(), StoreError>;

    /// Writes the settings and the allow-list together, but only while no
    /// client id is stored.
    ///
    /// Returns false, writing nothing, if the deployment is already configured.
    /// The check and both writes happen as one step.
    async fn initialize(
        &self,
        settings: &DiscordSettings,
        allow_list: &AllowList,
    ) -> Result<bool, StoreError>;
}

/// Durable storage for sessions, keyed by session ID.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persists a new session.
    async fn create(&self, session: &Session) -> Result<(), StoreError>;

    /// Finds a session by ID.
    async fn find_by_id(&self, id: SessionId) -> Result<Option<Session>, StoreError>;

    /// Deletes a session. Deleting an unknown ID succeeds.
    async fn delete(&self, id: SessionId) -> Result<(), StoreError>;

    /// Deletes expired sessions and returns how many were removed.
    async fn delete_expired(&self) -> Result<u64, StoreError>;
}

/// A backend that implements every store the gate needs.
pub trait GateStore: AllowListStore + SettingsStore + SessionStore {}

impl<T> GateStore for T where T: AllowListStore + SettingsStore + SessionStore {}
