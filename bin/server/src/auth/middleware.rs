//! Authentication extractors for Axum.

use axum::{
    Json,
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use gatehouse_core::SessionId;
use gatehouse_platform_access::{AuthenticatedAdmin, AuthorizationError};
use std::sync::Arc;

use super::{AppState, SESSION_COOKIE};

/// Extractor for requiring an authenticated administrator.
///
/// Rejects with `401` when the session cookie is missing, unknown or expired.
pub struct RequireAdmin(pub AuthenticatedAdmin);

impl<S> FromRequestParts<S> for RequireAdmin
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);
        let jar = CookieJar::from_request_parts(parts, state)
            .await
            .map_err(|_| AuthRejection(AuthorizationError::NotAuthenticated))?;

        // Get session ID from cookie
        let session_id = jar
            .get(SESSION_COOKIE)
            .and_then(|c| c.value().parse::<SessionId>().ok())
            .ok_or(AuthRejection(AuthorizationError::NotAuthenticated))?;

        let admin = app_state
            .gate
            .authenticate(session_id)
            .await
            .map_err(AuthRejection)?;

        Ok(RequireAdmin(admin))
    }
}

/// Rejection type for authentication extractors.
#[derive(Debug)]
pub struct AuthRejection(pub AuthorizationError);

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AuthorizationError::NotAuthenticated => {
                (StatusCode::UNAUTHORIZED, "Not authenticated")
            }
            AuthorizationError::SessionExpired { session_id } => {
                tracing::debug!(%session_id, "Session expired");
                (StatusCode::UNAUTHORIZED, "Session expired")
            }
            AuthorizationError::CheckFailed { reason } => {
                tracing::error!(%reason, "Session lookup failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
