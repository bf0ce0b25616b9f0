//! Error types for the admin API.
//!
//! Variants carry server-side detail for logging; responses only expose a
//! user-safe message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gatehouse_platform_access::StoreError;
use rootcause::Report;
use std::fmt;

/// Admin API errors.
#[derive(Debug)]
pub enum ApiError {
    /// The request body failed validation.
    InvalidRequest { details: String },
    /// The id is already on the allow-list.
    AlreadyPresent { id: String },
    /// The id is not on the allow-list.
    NotPresent { id: String },
    /// Removing the id would leave the allow-list empty.
    LastAdmin { id: String },
    /// Setup was attempted after a client id was configured.
    AlreadyConfigured,
    /// The settings, allow-list or session store failed.
    Store { details: String },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest { details } => write!(f, "invalid request: {}", details),
            Self::AlreadyPresent { id } => write!(f, "'{}' is already an admin", id),
            Self::NotPresent { id } => write!(f, "'{}' is not an admin", id),
            Self::LastAdmin { id } => write!(f, "'{}' is the last admin and cannot be removed", id),
            Self::AlreadyConfigured => write!(f, "Discord login is already configured"),
            Self::Store { details } => write!(f, "store error: {}", details),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<Report<StoreError>> for ApiError {
    fn from(e: Report<StoreError>) -> Self {
        Self::Store {
            details: e.to_string(),
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Self::AlreadyPresent { .. } | Self::LastAdmin { .. } | Self::AlreadyConfigured => {
                StatusCode::CONFLICT
            }
            Self::NotPresent { .. } => StatusCode::NOT_FOUND,
            Self::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Store { details } => {
                tracing::error!(%details, "Admin API store error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (self.status(), Json(serde_json::json!({ "error": message }))).into_response()
    }
}
