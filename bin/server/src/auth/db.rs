//! PostgreSQL backend for settings, the allow-list and sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatehouse_core::{Result, SessionId};
use gatehouse_platform_access::{
    AllowList, AllowListStore, BearerCredential, DiscordSettings, Identity, Session,
    SessionStore, SettingsStore, StoreError,
};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::{debug, instrument};

/// Row type for settings queries.
#[derive(FromRow)]
struct SettingsRow {
    client_id: Option<String>,
    client_secret: Option<String>,
    guild_id: Option<String>,
}

/// Row type for session queries.
#[derive(FromRow)]
struct SessionRow {
    id: String,
    user_id: String,
    username: String,
    avatar: Option<String>,
    token_type: String,
    access_token: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SessionRow {
    fn try_into_session(self) -> std::result::Result<Session, StoreError> {
        let id = SessionId::from_str(&self.id).map_err(|e| StoreError::Serialization {
            details: format!("invalid session id '{}': {}", self.id, e),
        })?;
        Ok(Session::with_all_fields(
            id,
            Identity::new(self.user_id, self.username, self.avatar),
            self.issued_at,
            self.expires_at,
            BearerCredential::new(self.token_type, self.access_token),
        ))
    }
}

fn database_error(e: sqlx::Error) -> StoreError {
    StoreError::Database {
        details: e.to_string(),
    }
}

/// Gate stores backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new store over a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AllowListStore for PgStore {
    async fn load_allow_list(&self) -> Result<AllowList, StoreError> {
        let row: Option<(Option<serde_json::Value>,)> = sqlx::query_as(
            r#"
            SELECT allowed_admins
            FROM gate_settings
            WHERE id = 'default'
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(AllowList::from_value(row.and_then(|(v,)| v).as_ref()))
    }

    #[instrument(skip(self, allow_list), fields(count = allow_list.len()))]
    async fn save_allow_list(&self, allow_list: &AllowList) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO gate_settings (id, allowed_admins, updated_at)
            VALUES ('default', $1, NOW())
            ON CONFLICT (id) DO UPDATE
            SET allowed_admins = EXCLUDED.allowed_admins, updated_at = NOW()
            "#,
        )
        .bind(allow_list.to_value())
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        debug!("allow-list saved");
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for PgStore {
    async fn load_settings(&self) -> Result<DiscordSettings, StoreError> {
        let row: Option<SettingsRow> = sqlx::query_as(
            r#"
            SELECT client_id, client_secret, guild_id
            FROM gate_settings
            WHERE id = 'default'
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(row
            .map(|r| DiscordSettings {
                client_id: r.client_id,
                client_secret: r.client_secret,
                guild_id: r.guild_id,
            })
            .unwrap_or_default())
    }

    #[instrument(skip(self, settings))]
    async fn save_settings(&self, settings: &DiscordSettings) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO gate_settings (id, client_id, client_secret, guild_id, updated_at)
            VALUES ('default', $1, $2, $3, NOW())
            ON CONFLICT (id) DO UPDATE
            SET client_id = EXCLUDED.client_id,
                client_secret = EXCLUDED.client_secret,
                guild_id = EXCLUDED.guild_id,
                updated_at = NOW()
            "#,
        )
        .bind(&settings.client_id)
        .bind(&settings.client_secret)
        .bind(&settings.guild_id)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        debug!("settings saved");
        Ok(())
    }

    #[instrument(skip(self, settings, allow_list), fields(count = allow_list.len()))]
    async fn initialize(
        &self,
        settings: &DiscordSettings,
        allow_list: &AllowList,
    ) -> Result<bool, StoreError> {
        // The conflict branch only fires while the stored client id is blank.
        let result = sqlx::query(
            r#"
            INSERT INTO gate_settings
                (id, client_id, client_secret, guild_id, allowed_admins, updated_at)
            VALUES ('default', $1, $2, $3, $4, NOW())
            ON CONFLICT (id) DO UPDATE
            SET client_id = EXCLUDED.client_id,
                client_secret = EXCLUDED.client_secret,
                guild_id = EXCLUDED.guild_id,
                allowed_admins = EXCLUDED.allowed_admins,
                updated_at = NOW()
            WHERE NULLIF(BTRIM(gate_settings.client_id), '') IS NULL
            "#,
        )
        .bind(&settings.client_id)
        .bind(&settings.client_secret)
        .bind(&settings.guild_id)
        .bind(allow_list.to_value())
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        let initialized = result.rows_affected() == 1;
        debug!(initialized, "settings initialization");
        Ok(initialized)
    }
}

#[async_trait]
impl SessionStore for PgStore {
    #[instrument(skip(self, session), fields(session_id = %session.id()))]
    async fn create(&self, session: &Session) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO admin_sessions
                (id, user_id, username, avatar, token_type, access_token, issued_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(session.id().to_string())
        .bind(session.identity().id())
        .bind(session.identity().username())
        .bind(session.identity().avatar())
        .bind(session.credential().token_type())
        .bind(session.credential().access_token())
        .bind(session.issued_at())
        .bind(session.expires_at())
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, username, avatar, token_type, access_token, issued_at, expires_at
            FROM admin_sessions
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        match row {
            Some(r) => Ok(Some(r.try_into_session()?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: SessionId) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            DELETE FROM admin_sessions
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM admin_sessions
            WHERE expires_at < NOW()
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(result.rows_affected())
    }
}
