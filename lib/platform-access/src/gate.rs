//! The Discord-identity authorization gate.
//!
//! One login attempt runs to completion in a single call:
//!
//! ```text
//! [Anonymous] --begin_login--> [PendingCallback]
//! [PendingCallback] --callback--> [Resolving]
//! [Resolving] --profile fetched, id allowed--> [Authenticated]
//! [Resolving] --profile fetched, id not allowed--> [Denied]   (no session)
//! [Resolving] --any HTTP failure--> [Failed]                  (no session)
//! [Authenticated] --logout--> [Anonymous]
//! ```
//!
//! Only `complete_login` creates sessions and only `logout` (plus expiry
//! cleanup) deletes them. Sessions are not re-validated when the allow-list
//! changes afterwards.

use chrono::Duration;
use gatehouse_core::SessionId;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::allow_list::AllowList;
use crate::auth::{AuthenticatedAdmin, CallbackPayload, IdentityProvider, LoginInitiation};
use crate::error::{AuthenticationError, AuthorizationError};
use crate::identity::Identity;
use crate::session::{BearerCredential, Session};
use crate::settings::LoginFlow;
use crate::store::GateStore;

/// Decides whether a provider callback may establish an administrative session.
#[derive(Clone)]
pub struct AuthorizationGate {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn GateStore>,
    session_duration: Duration,
}

impl AuthorizationGate {
    /// Creates a gate over a provider and a store.
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn GateStore>,
        session_duration: Duration,
    ) -> Self {
        Self {
            provider,
            store,
            session_duration,
        }
    }

    /// Returns the backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn GateStore> {
        &self.store
    }

    /// Returns the login flow the provider is configured for.
    #[must_use]
    pub fn flow(&self) -> LoginFlow {
        self.provider.flow()
    }

    /// Builds the provider authorize URL for the configured client id.
    ///
    /// # Errors
    ///
    /// `NotConfigured` when no client id has been entered. No URL is produced
    /// in that case, so the caller cannot navigate.
    #[instrument(skip(self))]
    pub async fn begin_login(&self) -> Result<LoginInitiation, AuthenticationError> {
        let settings = self.store.load_settings().await.map_err(store_error)?;
        let client_id = settings
            .client_id()
            .ok_or(AuthenticationError::NotConfigured {
                missing: "client id",
            })?;

        self.provider.authorization_url(client_id)
    }

    /// Resolves a callback into a session, or fails without creating one.
    ///
    /// # Errors
    ///
    /// - `FlowMismatch` if the payload is not for the configured flow
    /// - `NotConfigured` if the code flow is used without a client id/secret
    /// - `TokenExchangeFailed` if the code exchange fails (no profile call is made)
    /// - `ProfileFetchFailed` if the profile endpoint rejects the credential
    /// - `Unauthorized` if the identity is not on the allow-list
    /// - `Store` if reading the allow-list or writing the session fails
    #[instrument(skip(self, payload), fields(flow = ?payload.flow()))]
    pub async fn complete_login(
        &self,
        payload: CallbackPayload,
    ) -> Result<Session, AuthenticationError> {
        let expected = self.provider.flow();
        if payload.flow() != expected {
            warn!(?expected, received = ?payload.flow(), "callback for unexpected flow");
            return Err(AuthenticationError::FlowMismatch {
                expected,
                received: payload.flow(),
            });
        }

        let credential = match payload {
            CallbackPayload::Implicit {
                access_token,
                token_type,
            } => BearerCredential::new(token_type, access_token),
            CallbackPayload::Code { code } => {
                let settings = self.store.load_settings().await.map_err(store_error)?;
                let client_id = settings
                    .client_id()
                    .ok_or(AuthenticationError::NotConfigured {
                        missing: "client id",
                    })?;
                let client_secret =
                    settings
                        .client_secret()
                        .ok_or(AuthenticationError::NotConfigured {
                            missing: "client secret",
                        })?;

                self.provider
                    .exchange_code(client_id, client_secret, &code)
                    .await?
            }
        };

        let identity = self.provider.fetch_profile(&credential).await?;

        let allow_list = self
            .store
            .load_allow_list()
            .await
            .map_err(store_error)?;

        if !allow_list.permits(&identity) {
            warn!(user_id = %identity.id(), "login denied: not on allow-list");
            return Err(AuthenticationError::Unauthorized {
                user_id: identity.id().to_string(),
            });
        }

        let session = Session::new(identity, credential, self.session_duration);
        self.store.create(&session).await.map_err(store_error)?;

        info!(
            user_id = %session.identity().id(),
            session_id = %session.id(),
            "admin session created"
        );
        Ok(session)
    }

    /// Returns true if the identity is on the current allow-list.
    ///
    /// Never fails: a store error or malformed stored list denies.
    pub async fn is_authorized(&self, identity: &Identity) -> bool {
        self.current_allow_list().await.permits(identity)
    }

    /// Reads the allow-list, treating any failure as an empty list.
    pub async fn current_allow_list(&self) -> AllowList {
        match self.store.load_allow_list().await {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "allow-list unavailable, denying");
                AllowList::empty()
            }
        }
    }

    /// Resolves a session cookie into the administrator it belongs to.
    ///
    /// An expired session is deleted before being reported.
    ///
    /// # Errors
    ///
    /// - `NotAuthenticated` if no such session exists
    /// - `SessionExpired` if it exists but has expired
    /// - `CheckFailed` if the session store cannot be read
    #[instrument(skip(self))]
    pub async fn authenticate(
        &self,
        session_id: SessionId,
    ) -> Result<AuthenticatedAdmin, AuthorizationError> {
        let session = self
            .store
            .find_by_id(session_id)
            .await
            .map_err(|e| AuthorizationError::CheckFailed {
                reason: e.to_string(),
            })?
            .ok_or(AuthorizationError::NotAuthenticated)?;

        if session.is_expired() {
            if let Err(e) = self.store.delete(session_id).await {
                warn!(error = %e, "failed to delete expired session");
            }
            return Err(AuthorizationError::SessionExpired { session_id });
        }

        Ok(AuthenticatedAdmin::new(session))
    }

    /// Restores a persisted session, dropping it if it has expired.
    ///
    /// # Errors
    ///
    /// `Store` if the session store cannot be read.
    pub async fn restore_session(
        &self,
        session_id: SessionId,
    ) -> Result<Option<Session>, AuthenticationError> {
        match self.authenticate(session_id).await {
            Ok(admin) => Ok(Some(admin.into_session())),
            Err(AuthorizationError::NotAuthenticated | AuthorizationError::SessionExpired { .. }) => {
                Ok(None)
            }
            Err(AuthorizationError::CheckFailed { reason }) => {
                Err(AuthenticationError::Store { reason })
            }
        }
    }

    /// Clears the persisted session. Idempotent.
    ///
    /// # Errors
    ///
    /// `Store` if the session store cannot be written.
    #[instrument(skip(self))]
    pub async fn logout(&self, session_id: SessionId) -> Result<(), AuthenticationError> {
        self.store.delete(session_id).await.map_err(store_error)?;
        info!("admin session cleared");
        Ok(())
    }
}

fn store_error<E: std::fmt::Display>(e: E) -> AuthenticationError {
    AuthenticationError::Store {
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_store::JsonFileStore;
    use crate::settings::{DiscordSettings, LoginFlow};
    use crate::store::{AllowListStore, SessionStore, SettingsStore};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider double that records calls.
    struct FakeProvider {
        flow: LoginFlow,
        identity: Identity,
        exchange_fails: bool,
        profile_fails: bool,
        exchange_calls: AtomicUsize,
        profile_calls: AtomicUsize,
        seen_credentials: Mutex<Vec<BearerCredential>>,
    }

    impl FakeProvider {
        fn returning(id: &str) -> Self {
            Self {
                flow: LoginFlow::Code,
                identity: Identity::new(id, format!("user{id}"), None),
                exchange_fails: false,
                profile_fails: false,
                exchange_calls: AtomicUsize::new(0),
                profile_calls: AtomicUsize::new(0),
                seen_credentials: Mutex::new(Vec::new()),
            }
        }

        fn implicit(id: &str) -> Self {
            Self {
                flow: LoginFlow::Token,
                ..Self::returning(id)
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        fn flow(&self) -> LoginFlow {
            self.flow
        }

        fn authorization_url(
            &self,
            client_id: &str,
        ) -> Result<LoginInitiation, AuthenticationError> {
            Ok(LoginInitiation {
                authorization_url: format!(
                    "https://discord.test/oauth2/authorize?client_id={client_id}"
                ),
                state: "state".to_string(),
                flow: self.flow,
            })
        }

        async fn exchange_code(
            &self,
            _client_id: &str,
            _client_secret: &str,
            code: &str,
        ) -> Result<BearerCredential, AuthenticationError> {
            self.exchange_calls.fetch_add(1, Ordering::SeqCst);
            if self.exchange_fails {
                return Err(AuthenticationError::TokenExchangeFailed {
                    reason: "HTTP 400".to_string(),
                });
            }
            Ok(BearerCredential::new("Bearer", format!("token-for-{code}")))
        }

        async fn fetch_profile(
            &self,
            credential: &BearerCredential,
        ) -> Result<Identity, AuthenticationError> {
            self.profile_calls.fetch_add(1, Ordering::SeqCst);
            self.seen_credentials
                .lock()
                .expect("lock")
                .push(credential.clone());
            if self.profile_fails {
                return Err(AuthenticationError::ProfileFetchFailed {
                    reason: "HTTP 401".to_string(),
                });
            }
            Ok(self.identity.clone())
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<JsonFileStore>,
        provider: Arc<FakeProvider>,
        gate: AuthorizationGate,
    }

    async fn fixture(provider: FakeProvider, settings: DiscordSettings) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(JsonFileStore::new(dir.path().join("gate.json")));
        store.save_settings(&settings).await.expect("settings");
        store
            .save_allow_list(&["111", "222"].into_iter().collect())
            .await
            .expect("allow-list");

        let provider = Arc::new(provider);
        let gate = AuthorizationGate::new(provider.clone(), store.clone(), Duration::hours(1));
        Fixture {
            _dir: dir,
            store,
            provider,
            gate,
        }
    }

    fn configured() -> DiscordSettings {
        DiscordSettings {
            client_id: Some("client".to_string()),
            client_secret: Some("secret".to_string()),
            guild_id: None,
        }
    }

    fn code(code: &str) -> CallbackPayload {
        CallbackPayload::Code {
            code: code.to_string(),
        }
    }

    #[tokio::test]
    async fn allowed_identity_gets_a_session() {
        let f = fixture(FakeProvider::returning("111"), configured()).await;

        let session = f.gate.complete_login(code("abc")).await.expect("login");

        assert_eq!(session.identity().id(), "111");
        assert_eq!(session.credential().access_token(), "token-for-abc");
        let stored = f.store.find_by_id(session.id()).await.expect("find");
        assert_eq!(stored.as_ref(), Some(&session));
    }

    #[tokio::test]
    async fn unknown_identity_is_unauthorized_and_leaves_no_session() {
        let f = fixture(FakeProvider::returning("333"), configured()).await;

        let err = f.gate.complete_login(code("abc")).await.unwrap_err();

        assert_eq!(
            err,
            AuthenticationError::Unauthorized {
                user_id: "333".to_string()
            }
        );
        assert_eq!(f.store.delete_expired().await.expect("cleanup"), 0);
        let raw = tokio::fs::read_to_string(f.store.path()).await.expect("read");
        let doc: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(doc["sessions"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn token_exchange_failure_skips_profile_fetch() {
        let mut provider = FakeProvider::returning("111");
        provider.exchange_fails = true;
        let f = fixture(provider, configured()).await;

        let err = f.gate.complete_login(code("abc")).await.unwrap_err();

        assert!(matches!(err, AuthenticationError::TokenExchangeFailed { .. }));
        assert_eq!(f.provider.exchange_calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.provider.profile_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn profile_failure_is_reported() {
        let mut provider = FakeProvider::returning("111");
        provider.profile_fails = true;
        let f = fixture(provider, configured()).await;

        let err = f.gate.complete_login(code("abc")).await.unwrap_err();
        assert!(matches!(err, AuthenticationError::ProfileFetchFailed { .. }));
    }

    #[tokio::test]
    async fn implicit_flow_skips_exchange_and_uses_given_token() {
        let f = fixture(FakeProvider::implicit("222"), DiscordSettings::default()).await;

        let session = f
            .gate
            .complete_login(CallbackPayload::Implicit {
                access_token: "frag-token".to_string(),
                token_type: "Bearer".to_string(),
            })
            .await
            .expect("login");

        assert_eq!(session.identity().id(), "222");
        assert_eq!(f.provider.exchange_calls.load(Ordering::SeqCst), 0);
        let seen = f.provider.seen_credentials.lock().expect("lock");
        assert_eq!(seen[0].access_token(), "frag-token");
    }

    #[tokio::test]
    async fn implicit_payload_rejected_under_code_flow() {
        let f = fixture(FakeProvider::returning("111"), configured()).await;

        let err = f
            .gate
            .complete_login(CallbackPayload::Implicit {
                access_token: "foreign-token".to_string(),
                token_type: "Bearer".to_string(),
            })
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AuthenticationError::FlowMismatch {
                expected: LoginFlow::Code,
                received: LoginFlow::Token,
            }
        );
        assert_eq!(f.provider.profile_calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.store.delete_expired().await.expect("cleanup"), 0);
        let raw = tokio::fs::read_to_string(f.store.path()).await.expect("read");
        let doc: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(doc["sessions"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn code_payload_rejected_under_implicit_flow() {
        let f = fixture(FakeProvider::implicit("111"), configured()).await;

        let err = f.gate.complete_login(code("abc")).await.unwrap_err();

        assert!(matches!(err, AuthenticationError::FlowMismatch { .. }));
        assert_eq!(f.provider.exchange_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn code_flow_without_secret_is_not_configured() {
        let settings = DiscordSettings {
            client_id: Some("client".to_string()),
            ..Default::default()
        };
        let f = fixture(FakeProvider::returning("111"), settings).await;

        let err = f.gate.complete_login(code("abc")).await.unwrap_err();
        assert!(err.is_not_configured());
        assert_eq!(f.provider.exchange_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn begin_login_without_client_id_is_not_configured() {
        let f = fixture(FakeProvider::returning("111"), DiscordSettings::default()).await;

        let err = f.gate.begin_login().await.unwrap_err();
        assert!(err.is_not_configured());
    }

    #[tokio::test]
    async fn begin_login_uses_stored_client_id() {
        let f = fixture(FakeProvider::returning("111"), configured()).await;

        let initiation = f.gate.begin_login().await.expect("begin");
        assert!(initiation.authorization_url.contains("client_id=client"));
    }

    #[tokio::test]
    async fn is_authorized_follows_allow_list() {
        let f = fixture(FakeProvider::returning("111"), configured()).await;

        assert!(f.gate.is_authorized(&Identity::new("111", "a", None)).await);
        assert!(!f.gate.is_authorized(&Identity::new("333", "c", None)).await);
    }

    #[tokio::test]
    async fn is_authorized_denies_when_store_is_corrupt() {
        let f = fixture(FakeProvider::returning("111"), configured()).await;
        tokio::fs::write(f.store.path(), "garbage").await.expect("write");

        assert!(!f.gate.is_authorized(&Identity::new("111", "a", None)).await);
    }

    #[tokio::test]
    async fn logout_twice_is_same_as_once() {
        let f = fixture(FakeProvider::returning("111"), configured()).await;
        let session = f.gate.complete_login(code("abc")).await.expect("login");

        f.gate.logout(session.id()).await.expect("logout");
        f.gate.logout(session.id()).await.expect("logout again");

        assert!(f
            .gate
            .restore_session(session.id())
            .await
            .expect("restore")
            .is_none());
    }

    #[tokio::test]
    async fn logout_without_session_is_noop() {
        let f = fixture(FakeProvider::returning("111"), configured()).await;
        f.gate.logout(SessionId::new()).await.expect("logout");
    }

    #[tokio::test]
    async fn expired_session_is_not_restored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(JsonFileStore::new(dir.path().join("gate.json")));
        store
            .save_allow_list(&["111"].into_iter().collect())
            .await
            .expect("allow-list");
        let gate = AuthorizationGate::new(
            Arc::new(FakeProvider::implicit("111")),
            store.clone(),
            Duration::seconds(-1),
        );

        let session = gate
            .complete_login(CallbackPayload::Implicit {
                access_token: "t".to_string(),
                token_type: "Bearer".to_string(),
            })
            .await
            .expect("login");

        assert!(gate.restore_session(session.id()).await.expect("restore").is_none());
        assert!(store.find_by_id(session.id()).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn allow_list_change_does_not_revoke_existing_session() {
        let f = fixture(FakeProvider::returning("111"), configured()).await;
        let session = f.gate.complete_login(code("abc")).await.expect("login");

        f.store
            .save_allow_list(&AllowList::empty())
            .await
            .expect("clear");

        assert!(f
            .gate
            .restore_session(session.id())
            .await
            .expect("restore")
            .is_some());
        assert!(!f.gate.is_authorized(session.identity()).await);
    }

    #[tokio::test]
    async fn authenticate_resolves_live_session() {
        let f = fixture(FakeProvider::returning("111"), configured()).await;
        let session = f.gate.complete_login(code("abc")).await.expect("login");

        let admin = f.gate.authenticate(session.id()).await.expect("authenticate");
        assert_eq!(admin.session_id(), session.id());
        assert_eq!(admin.identity().id(), "111");
    }

    #[tokio::test]
    async fn authenticate_unknown_session_is_not_authenticated() {
        let f = fixture(FakeProvider::returning("111"), configured()).await;

        let err = f.gate.authenticate(SessionId::new()).await.unwrap_err();
        assert_eq!(err, AuthorizationError::NotAuthenticated);
    }

    #[tokio::test]
    async fn authenticate_reports_expiry_and_deletes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(JsonFileStore::new(dir.path().join("gate.json")));
        store
            .save_allow_list(&["111"].into_iter().collect())
            .await
            .expect("allow-list");
        let gate = AuthorizationGate::new(
            Arc::new(FakeProvider::implicit("111")),
            store.clone(),
            Duration::seconds(-1),
        );
        let session = gate
            .complete_login(CallbackPayload::Implicit {
                access_token: "t".to_string(),
                token_type: "Bearer".to_string(),
            })
            .await
            .expect("login");

        let err = gate.authenticate(session.id()).await.unwrap_err();
        assert_eq!(
            err,
            AuthorizationError::SessionExpired {
                session_id: session.id()
            }
        );
        assert!(store.find_by_id(session.id()).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn authenticate_fails_closed_on_store_error() {
        let f = fixture(FakeProvider::returning("111"), configured()).await;
        tokio::fs::write(f.store.path(), "garbage").await.expect("write");

        let err = f.gate.authenticate(SessionId::new()).await.unwrap_err();
        assert!(matches!(err, AuthorizationError::CheckFailed { .. }));
    }
}
