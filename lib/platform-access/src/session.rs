//! Administrative sessions.
//!
//! A session is the locally persisted proof of a successful, authorized
//! login. It is created only by the authorization gate after the allow-list
//! check passes, and destroyed by logout or expiry.

use chrono::{DateTime, Duration, Utc};
use gatehouse_core::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identity::Identity;

/// The opaque access token presented to the provider's profile endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerCredential {
    token_type: String,
    access_token: String,
}

impl BearerCredential {
    /// Creates a credential. An empty token type is treated as `Bearer`.
    #[must_use]
    pub fn new(token_type: impl Into<String>, access_token: impl Into<String>) -> Self {
        let token_type = token_type.into();
        Self {
            token_type: if token_type.trim().is_empty() {
                "Bearer".to_string()
            } else {
                token_type
            },
            access_token: access_token.into(),
        }
    }

    /// Returns the token type as issued by the provider.
    #[must_use]
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Returns the raw access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the `Authorization` header value, `<token_type> <access_token>`.
    ///
    /// OAuth2 token types are case-insensitive; `bearer` is sent as `Bearer`.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        if self.token_type.eq_ignore_ascii_case("bearer") {
            format!("Bearer {}", self.access_token)
        } else {
            format!("{} {}", self.token_type, self.access_token)
        }
    }
}

impl fmt::Debug for BearerCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerCredential")
            .field("token_type", &self.token_type)
            .field("access_token", &"[redacted]")
            .finish()
    }
}

/// An authenticated, authorized administrative session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    identity: Identity,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    credential: BearerCredential,
}

impl Session {
    /// Creates a session issued now and valid for `duration`.
    #[must_use]
    pub fn new(identity: Identity, credential: BearerCredential, duration: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            identity,
            issued_at: now,
            expires_at: now + duration,
            credential,
        }
    }

    /// Reconstitutes a session from storage.
    #[must_use]
    pub fn with_all_fields(
        id: SessionId,
        identity: Identity,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        credential: BearerCredential,
    ) -> Self {
        Self {
            id,
            identity,
            issued_at,
            expires_at,
            credential,
        }
    }

    /// Returns the session ID.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the identity captured at login.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns when the session was issued.
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Returns when the session expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns the bearer credential obtained at login.
    #[must_use]
    pub fn credential(&self) -> &BearerCredential {
        &self.credential
    }

    /// Returns true if the session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}
