//! Authentication routes for login, callback, token relay and logout.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use gatehouse_core::SessionId;
use gatehouse_platform_access::{AuthenticationError, CallbackPayload, LoginFlow, Session};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::Duration as TimeDuration;

use super::{AppState, LOGIN_STATE_COOKIE, SESSION_COOKIE, middleware::RequireAdmin};

/// Query parameters for the Discord callback.
///
/// The implicit flow returns its token in the URL fragment, which never
/// reaches the server, so every field is optional here.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Fragment parameters posted back by the relay page.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    access_token: String,
    #[serde(default)]
    token_type: String,
    state: Option<String>,
}

/// The logged-in administrator.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: String,
    pub username: String,
    pub avatar: Option<String>,
    pub avatar_url: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl From<&Session> for MeResponse {
    fn from(session: &Session) -> Self {
        let identity = session.identity();
        Self {
            id: identity.id().to_string(),
            username: identity.username().to_string(),
            avatar: identity.avatar().map(str::to_string),
            avatar_url: identity.avatar_url(),
            expires_at: session.expires_at(),
        }
    }
}

/// Reads the URL fragment left by an implicit-flow redirect and posts it to
/// `/auth/token`.
const FRAGMENT_RELAY_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Signing in</title></head>
<body>
<p id="status">Signing in&hellip;</p>
<script>
(function () {
  var params = new URLSearchParams(window.location.hash.slice(1));
  var status = document.getElementById("status");
  if (!params.get("access_token")) {
    status.textContent = "No credential was returned by Discord.";
    return;
  }
  fetch("/auth/token", {
    method: "POST",
    credentials: "same-origin",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify({
      access_token: params.get("access_token"),
      token_type: params.get("token_type") || "",
      state: params.get("state")
    })
  }).then(function (response) {
    if (response.ok) {
      window.location.replace("/");
    } else {
      return response.text().then(function (text) { status.textContent = text; });
    }
  });
})();
</script>
</body>
</html>
"#;

/// Initiates the Discord login flow by redirecting to the authorize URL.
///
/// Redirects to `/setup` while no client id is configured.
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Response, AuthError> {
    let initiation = match state.gate.begin_login().await {
        Ok(initiation) => initiation,
        Err(e) if e.is_not_configured() => {
            tracing::info!("Discord login not configured, redirecting to setup");
            return Ok(Redirect::to("/setup").into_response());
        }
        Err(e) => return Err(e.into()),
    };

    // Store the state in a cookie for validation on callback
    let cookie = Cookie::build((LOGIN_STATE_COOKIE, initiation.state))
        .path("/")
        .http_only(true)
        .secure(state.session_config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::minutes(10));

    Ok((jar.add(cookie), Redirect::to(&initiation.authorization_url)).into_response())
}

/// Handles the Discord callback.
///
/// Under the code flow this exchanges the returned `code`. Under the implicit
/// flow it serves the relay page that forwards the URL fragment to [`token`].
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Result<Response, AuthError> {
    if let Some(error) = query.error {
        return Err(AuthError::ProviderDenied(error));
    }

    if state.gate.flow() == LoginFlow::Token {
        return Ok(Html(FRAGMENT_RELAY_PAGE).into_response());
    }

    let code = query.code.ok_or(AuthError::MissingCode)?;

    verify_state(&jar, query.state.as_deref())?;

    let session = state
        .gate
        .complete_login(CallbackPayload::Code { code })
        .await?;

    let jar = jar
        .add(session_cookie(&state, &session))
        .add(removal_cookie(LOGIN_STATE_COOKIE));

    Ok((jar, Redirect::to("/")).into_response())
}

/// Completes the implicit flow with a token relayed from the URL fragment.
///
/// Rejected unless the deployment is configured for the implicit flow.
pub async fn token(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<TokenRequest>,
) -> Result<impl IntoResponse, AuthError> {
    verify_state(&jar, request.state.as_deref())?;

    let session = state
        .gate
        .complete_login(CallbackPayload::Implicit {
            access_token: request.access_token,
            token_type: request.token_type,
        })
        .await?;

    let jar = jar
        .add(session_cookie(&state, &session))
        .add(removal_cookie(LOGIN_STATE_COOKIE));

    Ok((jar, Json(MeResponse::from(&session))))
}

/// Logs out the administrator by deleting their session.
pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let session_id = jar
        .get(SESSION_COOKIE)
        .and_then(|c| c.value().parse::<SessionId>().ok());

    if let Some(session_id) = session_id {
        if let Err(e) = state.gate.logout(session_id).await {
            tracing::warn!(error = %e, %session_id, "Failed to delete session on logout");
        }
    }

    (jar.add(removal_cookie(SESSION_COOKIE)), Redirect::to("/"))
}

/// Returns the identity behind the current session.
pub async fn me(RequireAdmin(admin): RequireAdmin) -> Json<MeResponse> {
    Json(MeResponse::from(admin.session()))
}

fn verify_state(jar: &CookieJar, returned: Option<&str>) -> Result<(), AuthError> {
    let expected = jar
        .get(LOGIN_STATE_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::MissingLoginState)?;

    if returned != Some(expected.as_str()) {
        return Err(AuthError::StateMismatch);
    }
    Ok(())
}

fn session_cookie(state: &AppState, session: &Session) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.id().to_string()))
        .path("/")
        .http_only(true)
        .secure(state.session_config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::minutes(state.session_config.duration_minutes))
        .build()
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .max_age(TimeDuration::ZERO)
        .build()
}

/// Login route errors.
#[derive(Debug)]
pub enum AuthError {
    MissingLoginState,
    StateMismatch,
    MissingCode,
    ProviderDenied(String),
    Login(AuthenticationError),
}

impl From<AuthenticationError> for AuthError {
    fn from(e: AuthenticationError) -> Self {
        Self::Login(e)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::MissingLoginState => (StatusCode::BAD_REQUEST, "Missing login state"),
            Self::StateMismatch => (StatusCode::BAD_REQUEST, "Login state mismatch"),
            Self::MissingCode => (StatusCode::BAD_REQUEST, "Missing authorization code"),
            Self::ProviderDenied(error) => {
                tracing::info!(%error, "Discord authorization not granted");
                (StatusCode::BAD_REQUEST, "Discord authorization was not granted")
            }
            Self::Login(e) => match e {
                AuthenticationError::NotConfigured { .. } => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Discord login is not configured",
                ),
                AuthenticationError::FlowMismatch { .. } => {
                    tracing::warn!(error = %e, "Rejected login for unconfigured flow");
                    (StatusCode::BAD_REQUEST, "Login flow not enabled")
                }
                AuthenticationError::TokenExchangeFailed { .. }
                | AuthenticationError::ProfileFetchFailed { .. } => {
                    tracing::error!(error = %e, "Discord authentication failed");
                    (StatusCode::BAD_GATEWAY, "Discord authentication failed")
                }
                AuthenticationError::Unauthorized { .. } => (
                    StatusCode::FORBIDDEN,
                    "Access denied - you are not on the admin allow-list",
                ),
                AuthenticationError::Store { .. } => {
                    tracing::error!(error = %e, "Store error during login");
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
                }
            },
        };

        (status, message).into_response()
    }
}
