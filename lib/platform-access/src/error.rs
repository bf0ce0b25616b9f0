//! Error types for the platform-access crate.
//!
//! - `AuthenticationError`: terminal failures of a single login attempt
//! - `AuthorizationError`: failures when gating an admin request
//! - `StoreError`: persistence failures, carried inside a rootcause `Report`

use gatehouse_core::SessionId;
use std::fmt;

use crate::settings::LoginFlow;

/// Errors from a login attempt.
///
/// Every variant is terminal for the attempt and none of them leaves a
/// session behind. The caller restarts from `begin_login`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    /// The Discord application is not configured (client id or secret missing).
    NotConfigured { missing: &'static str },
    /// The callback carried a credential for a flow this deployment does not use.
    FlowMismatch {
        expected: LoginFlow,
        received: LoginFlow,
    },
    /// The token endpoint rejected the authorization code.
    TokenExchangeFailed { reason: String },
    /// The profile endpoint rejected the bearer credential.
    ProfileFetchFailed { reason: String },
    /// The identity is valid but not on the allow-list.
    Unauthorized { user_id: String },
    /// The settings, allow-list or session store failed.
    Store { reason: String },
}

impl AuthenticationError {
    /// Returns true when the operator must complete setup before anyone can log in.
    #[must_use]
    pub fn is_not_configured(&self) -> bool {
        matches!(self, Self::NotConfigured { .. })
    }
}

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured { missing } => {
                write!(f, "identity provider not configured: missing {missing}")
            }
            Self::FlowMismatch { expected, received } => write!(
                f,
                "expected a '{}' callback, got '{}'",
                expected.response_type(),
                received.response_type()
            ),
            Self::TokenExchangeFailed { reason } => {
                write!(f, "token exchange failed: {reason}")
            }
            Self::ProfileFetchFailed { reason } => {
                write!(f, "profile fetch failed: {reason}")
            }
            Self::Unauthorized { user_id } => {
                write!(f, "user {user_id} is not on the allow-list")
            }
            Self::Store { reason } => {
                write!(f, "store error: {reason}")
            }
        }
    }
}

impl std::error::Error for AuthenticationError {}

/// Errors from gating an administrative request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    /// No session accompanies the request.
    NotAuthenticated,
    /// The referenced session has expired.
    SessionExpired { session_id: SessionId },
    /// Looking up the session failed.
    CheckFailed { reason: String },
}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAuthenticated => write!(f, "not authenticated"),
            Self::SessionExpired { session_id } => {
                write!(f, "session {session_id} has expired")
            }
            Self::CheckFailed { reason } => {
                write!(f, "session check failed: {reason}")
            }
        }
    }
}

impl std::error::Error for AuthorizationError {}

/// Errors from the persistence collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    Io { path: String, details: String },
    /// A stored document could not be encoded or decoded.
    Serialization { details: String },
    /// The database rejected a query.
    Database { details: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, details } => write!(f, "I/O error on '{path}': {details}"),
            Self::Serialization { details } => write!(f, "serialization error: {details}"),
            Self::Database { details } => write!(f, "database error: {details}"),
        }
    }
}

impl std::error::Error for StoreError {}
