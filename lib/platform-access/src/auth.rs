//! Login flow types and the identity-provider seam.
//!
//! - `IdentityProvider`: the three calls the gate makes to Discord
//! - `LoginInitiation`: where to send the browser, plus the CSRF state
//! - `CallbackPayload`: what came back on the callback
//! - `AuthenticatedAdmin`: the request-scoped view of a valid session

use async_trait::async_trait;
use gatehouse_core::SessionId;

use crate::error::AuthenticationError;
use crate::identity::Identity;
use crate::session::{BearerCredential, Session};
use crate::settings::LoginFlow;

/// Operations the authorization gate needs from the identity provider.
///
/// Every call is single-attempt; implementations must not retry.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The flow this provider is configured to request.
    fn flow(&self) -> LoginFlow;

    /// Builds the authorize URL for `client_id`.
    fn authorization_url(&self, client_id: &str) -> Result<LoginInitiation, AuthenticationError>;

    /// Exchanges an authorization code for a bearer credential.
    ///
    /// Fails with `TokenExchangeFailed` on any non-success response.
    async fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
    ) -> Result<BearerCredential, AuthenticationError>;

    /// Fetches the caller's profile with the bearer credential.
    ///
    /// Fails with `ProfileFetchFailed` on any non-success response.
    async fn fetch_profile(
        &self,
        credential: &BearerCredential,
    ) -> Result<Identity, AuthenticationError>;
}

/// Login initiation data for redirecting to the provider.
#[derive(Debug, Clone)]
pub struct LoginInitiation {
    /// The URL to redirect the browser to.
    pub authorization_url: String,
    /// State parameter for CSRF protection (store in a cookie).
    pub state: String,
    /// The response type requested.
    pub flow: LoginFlow,
}

/// Credential returned to the callback.
#[derive(Clone, PartialEq, Eq)]
pub enum CallbackPayload {
    /// Access token taken from the URL fragment.
    Implicit {
        access_token: String,
        token_type: String,
    },
    /// Authorization code taken from the query string.
    Code { code: String },
}

impl CallbackPayload {
    /// Returns the flow this payload belongs to.
    #[must_use]
    pub fn flow(&self) -> LoginFlow {
        match self {
            Self::Implicit { .. } => LoginFlow::Token,
            Self::Code { .. } => LoginFlow::Code,
        }
    }
}

impl std::fmt::Debug for CallbackPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Implicit { token_type, .. } => f
                .debug_struct("Implicit")
                .field("token_type", token_type)
                .finish_non_exhaustive(),
            Self::Code { .. } => f.debug_struct("Code").finish_non_exhaustive(),
        }
    }
}

/// Represents an authenticated administrator extracted from a request.
#[derive(Debug, Clone)]
pub struct AuthenticatedAdmin {
    session: Session,
}

impl AuthenticatedAdmin {
    /// Wraps a valid session.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Returns the session ID.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session.id()
    }

    /// Returns the current session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the identity that logged in.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        self.session.identity()
    }

    /// Unwraps the session.
    #[must_use]
    pub fn into_session(self) -> Session {
        self.session
    }
}
