//! Discord OAuth2 client.
//!
//! Implements the identity-provider calls the authorization gate makes:
//! - authorize URL construction (code or implicit flow)
//! - `POST /oauth2/token` code exchange, client credentials in the form body
//! - `GET /users/@me` profile fetch
//!
//! Every call is single-attempt. Failures map to `TokenExchangeFailed` or
//! `ProfileFetchFailed` and are never retried.

use async_trait::async_trait;
use gatehouse_platform_access::{
    AuthenticationError, BearerCredential, Identity, IdentityProvider, LoginFlow, LoginInitiation,
    ProviderConfig,
};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope,
    TokenResponse, TokenUrl,
    basic::{BasicClient, BasicTokenType},
};
use tracing::{debug, instrument};

/// Discord OAuth2 client configuration.
#[derive(Clone)]
pub struct DiscordClient {
    http: reqwest::Client,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    redirect_url: RedirectUrl,
    config: ProviderConfig,
}

impl DiscordClient {
    /// Creates a Discord client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: ProviderConfig) -> Result<Self, DiscordClientError> {
        let auth_url = AuthUrl::new(config.authorize_url())
            .map_err(|e| DiscordClientError::Configuration(format!("invalid API base: {e}")))?;
        let token_url = TokenUrl::new(config.token_url())
            .map_err(|e| DiscordClientError::Configuration(format!("invalid API base: {e}")))?;
        let redirect_url = RedirectUrl::new(config.redirect_uri().to_string())
            .map_err(|e| DiscordClientError::Configuration(format!("invalid redirect URI: {e}")))?;

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                DiscordClientError::Configuration(format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            http,
            auth_url,
            token_url,
            redirect_url,
            config,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[async_trait]
impl IdentityProvider for DiscordClient {
    fn flow(&self) -> LoginFlow {
        self.config.flow()
    }

    fn authorization_url(&self, client_id: &str) -> Result<LoginInitiation, AuthenticationError> {
        if client_id.trim().is_empty() {
            return Err(AuthenticationError::NotConfigured {
                missing: "client id",
            });
        }

        let client = BasicClient::new(ClientId::new(client_id.to_string()))
            .set_auth_uri(self.auth_url.clone())
            .set_redirect_uri(self.redirect_url.clone());

        let mut auth_request = client.authorize_url(CsrfToken::new_random);

        for scope in self.config.scopes() {
            auth_request = auth_request.add_scope(Scope::new(scope.to_string()));
        }

        let flow = self.config.flow();
        if flow == LoginFlow::Token {
            auth_request = auth_request.use_implicit_flow();
        }

        let (auth_url, csrf_token) = auth_request.url();

        Ok(LoginInitiation {
            authorization_url: auth_url.to_string(),
            state: csrf_token.secret().clone(),
            flow,
        })
    }

    #[instrument(skip_all)]
    async fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
    ) -> Result<BearerCredential, AuthenticationError> {
        let client = BasicClient::new(ClientId::new(client_id.to_string()))
            .set_client_secret(ClientSecret::new(client_secret.to_string()))
            .set_auth_type(AuthType::RequestBody)
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone());

        let token_result = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| AuthenticationError::TokenExchangeFailed {
                reason: e.to_string(),
            })?;

        let token_type = match token_result.token_type() {
            BasicTokenType::Bearer => "Bearer".to_string(),
            BasicTokenType::Mac => "MAC".to_string(),
            BasicTokenType::Extension(other) => other.clone(),
        };

        debug!(token_type = %token_type, "authorization code exchanged");
        Ok(BearerCredential::new(
            token_type,
            token_result.access_token().secret().clone(),
        ))
    }

    #[instrument(skip_all)]
    async fn fetch_profile(
        &self,
        credential: &BearerCredential,
    ) -> Result<Identity, AuthenticationError> {
        let response = self
            .http
            .get(self.config.profile_url())
            .header(reqwest::header::AUTHORIZATION, credential.authorization_header())
            .send()
            .await
            .map_err(|e| AuthenticationError::ProfileFetchFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthenticationError::ProfileFetchFailed {
                reason: format!("Discord API error: {status}"),
            });
        }

        let identity: Identity =
            response
                .json()
                .await
                .map_err(|e| AuthenticationError::ProfileFetchFailed {
                    reason: format!("invalid profile response: {e}"),
                })?;

        debug!(user_id = %identity.id(), "profile fetched");
        Ok(identity)
    }
}

/// Discord client construction errors.
#[derive(Debug)]
pub enum DiscordClientError {
    /// Configuration error (invalid URLs, etc.)
    Configuration(String),
}

impl std::fmt::Display for DiscordClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "Discord client configuration error: {msg}"),
        }
    }
}

impl std::error::Error for DiscordClientError {}
