//! Admin API: allow-list management, Discord settings and one-time setup.
//!
//! Every `/admin/*` handler takes [`RequireAdmin`], so a request without a
//! live session never reaches the store.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use gatehouse_platform_access::{AllowList, DiscordSettings};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::auth::{AppState, RequireAdmin};
use crate::error::ApiError;

/// Shown in place of a stored client secret.
const MASKED_SECRET: &str = "********";

/// Current allow-list.
#[derive(Debug, Serialize)]
pub struct AllowListResponse {
    pub ids: Vec<String>,
}

impl From<&AllowList> for AllowListResponse {
    fn from(list: &AllowList) -> Self {
        Self {
            ids: list.iter().map(str::to_string).collect(),
        }
    }
}

/// Request to add an id to the allow-list.
#[derive(Debug, Deserialize)]
pub struct AddAdminRequest {
    pub id: String,
}

/// Discord settings with the client secret masked.
#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub client_id: Option<String>,
    pub client_secret: Option<&'static str>,
    pub guild_id: Option<String>,
    pub configured: bool,
}

impl From<&DiscordSettings> for SettingsResponse {
    fn from(settings: &DiscordSettings) -> Self {
        Self {
            client_id: settings.client_id().map(str::to_string),
            client_secret: settings.client_secret().map(|_| MASKED_SECRET),
            guild_id: settings.guild_id().map(str::to_string),
            configured: settings.is_configured(),
        }
    }
}

/// Settings update.
///
/// An absent `client_secret` keeps the stored one; an empty string clears it.
#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub guild_id: Option<String>,
}

/// First-run configuration.
#[derive(Debug, Deserialize)]
pub struct SetupRequest {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Discord user ids, one per line or comma separated.
    pub allowed_admins: String,
}

/// Whether setup has been completed.
#[derive(Debug, Serialize)]
pub struct SetupStatus {
    pub configured: bool,
}

/// Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Lists the allow-list.
pub async fn list_admins(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> Result<Json<AllowListResponse>, ApiError> {
    let list = state.gate.store().load_allow_list().await?;
    Ok(Json(AllowListResponse::from(&list)))
}

/// Adds an id to the allow-list.
pub async fn add_admin(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddAdminRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = request.id.trim();
    if id.is_empty() {
        return Err(ApiError::InvalidRequest {
            details: "id must not be empty".to_string(),
        });
    }

    let store = state.gate.store();
    let mut list = store.load_allow_list().await?;
    if !list.insert(id) {
        return Err(ApiError::AlreadyPresent { id: id.to_string() });
    }
    store.save_allow_list(&list).await?;

    info!(added = %id, by = %admin.identity().id(), "admin added to allow-list");
    Ok((StatusCode::CREATED, Json(AllowListResponse::from(&list))))
}

/// Removes an id from the allow-list.
///
/// The last id cannot be removed, since setup cannot be rerun to add one back.
/// Existing sessions of the removed id stay valid until they expire or log out.
pub async fn remove_admin(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AllowListResponse>, ApiError> {
    let store = state.gate.store();
    let mut list = store.load_allow_list().await?;
    if !list.remove(id.trim()) {
        return Err(ApiError::NotPresent { id });
    }
    if list.is_empty() {
        return Err(ApiError::LastAdmin { id });
    }
    store.save_allow_list(&list).await?;

    info!(removed = %id, by = %admin.identity().id(), "admin removed from allow-list");
    Ok(Json(AllowListResponse::from(&list)))
}

/// Returns the Discord settings.
pub async fn get_settings(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let settings = state.gate.store().load_settings().await?;
    Ok(Json(SettingsResponse::from(&settings)))
}

/// Replaces the Discord settings.
pub async fn update_settings(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let client_id = request.client_id.trim();
    if client_id.is_empty() {
        return Err(ApiError::InvalidRequest {
            details: "client id must not be empty".to_string(),
        });
    }

    let store = state.gate.store();
    let mut settings = store.load_settings().await?;
    settings.client_id = Some(client_id.to_string());
    settings.guild_id = request.guild_id.map(|g| g.trim().to_string());
    if let Some(secret) = request.client_secret {
        settings.client_secret = Some(secret.trim().to_string()).filter(|s| !s.is_empty());
    }
    store.save_settings(&settings).await?;

    info!(by = %admin.identity().id(), "Discord settings updated");
    Ok(Json(SettingsResponse::from(&settings)))
}

/// Reports whether setup has been completed.
pub async fn setup_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SetupStatus>, ApiError> {
    let settings = state.gate.store().load_settings().await?;
    Ok(Json(SetupStatus {
        configured: settings.is_configured(),
    }))
}

/// Stores the Discord settings and the initial allow-list.
///
/// Only accepted while no client id is configured.
pub async fn setup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SetupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let client_id = request.client_id.trim();
    if client_id.is_empty() {
        return Err(ApiError::InvalidRequest {
            details: "client id must not be empty".to_string(),
        });
    }

    let allow_list = AllowList::parse_lines(&request.allowed_admins);
    if allow_list.is_empty() {
        return Err(ApiError::InvalidRequest {
            details: "at least one admin id is required".to_string(),
        });
    }

    let settings = DiscordSettings {
        client_id: Some(client_id.to_string()),
        client_secret: request.client_secret.map(|s| s.trim().to_string()),
        guild_id: request.guild_id.map(|g| g.trim().to_string()),
    };

    if !state.gate.store().initialize(&settings, &allow_list).await? {
        return Err(ApiError::AlreadyConfigured);
    }

    info!(admins = allow_list.len(), "initial setup completed");
    Ok((StatusCode::CREATED, Json(SetupStatus { configured: true })))
}
