//! Identity-provider configuration and operator-editable Discord settings.
//!
//! `ProviderConfig` is static deployment configuration (loaded from the
//! environment). `DiscordSettings` is the Discord application registration
//! entered by the operator during setup and kept in the settings store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the provider returns the credential to the callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginFlow {
    /// Authorization code in the query string, exchanged server-side.
    #[default]
    Code,
    /// Access token in the URL fragment.
    Token,
}

impl LoginFlow {
    /// Returns the OAuth2 `response_type` value.
    #[must_use]
    pub fn response_type(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Token => "token",
        }
    }
}

/// Static configuration for the Discord identity provider.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the Discord API, without trailing slash.
    /// Default: "https://discord.com/api"
    #[serde(default = "default_api_base")]
    api_base: String,
    /// The callback URI registered with the Discord application.
    redirect_uri: String,
    /// Scopes to request, comma or space separated.
    /// Default: "identify"
    #[serde(default = "default_scopes")]
    scopes: String,
    /// Response type requested from the authorize endpoint.
    #[serde(default)]
    flow: LoginFlow,
    /// Overall timeout for provider HTTP calls, in seconds.
    #[serde(default = "default_request_timeout_seconds")]
    request_timeout_seconds: u64,
}

fn default_api_base() -> String {
    "https://discord.com/api".to_string()
}

fn default_scopes() -> String {
    "identify".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    10
}

impl ProviderConfig {
    /// Creates a configuration with defaults for optional fields.
    #[must_use]
    pub fn new(redirect_uri: impl Into<String>) -> Self {
        Self {
            api_base: default_api_base(),
            redirect_uri: redirect_uri.into(),
            scopes: default_scopes(),
            flow: LoginFlow::default(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Overrides the requested scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: impl Into<String>) -> Self {
        self.scopes = scopes.into();
        self
    }

    /// Overrides the login flow.
    #[must_use]
    pub fn with_flow(mut self, flow: LoginFlow) -> Self {
        self.flow = flow;
        self
    }

    /// Returns the API base URL without a trailing slash.
    #[must_use]
    pub fn api_base(&self) -> &str {
        self.api_base.trim_end_matches('/')
    }

    /// Returns `<api_base>/oauth2/authorize`.
    #[must_use]
    pub fn authorize_url(&self) -> String {
        format!("{}/oauth2/authorize", self.api_base())
    }

    /// Returns `<api_base>/oauth2/token`.
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.api_base())
    }

    /// Returns `<api_base>/users/@me`.
    #[must_use]
    pub fn profile_url(&self) -> String {
        format!("{}/users/@me", self.api_base())
    }

    /// Returns the callback URI.
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Returns the requested scopes.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.scopes
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Returns the login flow.
    #[must_use]
    pub fn flow(&self) -> LoginFlow {
        self.flow
    }

    /// Returns the HTTP timeout for provider calls.
    #[must_use]
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Discord application settings entered by the operator.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordSettings {
    /// OAuth2 client id of the Discord application.
    #[serde(default)]
    pub client_id: Option<String>,
    /// OAuth2 client secret (required for the code flow).
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Discord server the site's community lives in.
    #[serde(default)]
    pub guild_id: Option<String>,
}

impl DiscordSettings {
    /// Returns the client id if one is set and non-blank.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        non_blank(self.client_id.as_deref())
    }

    /// Returns the client secret if one is set and non-blank.
    #[must_use]
    pub fn client_secret(&self) -> Option<&str> {
        non_blank(self.client_secret.as_deref())
    }

    /// Returns the guild id if one is set and non-blank.
    #[must_use]
    pub fn guild_id(&self) -> Option<&str> {
        non_blank(self.guild_id.as_deref())
    }

    /// Returns true once a client id has been entered.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.client_id().is_some()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl fmt::Debug for DiscordSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordSettings")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("guild_id", &self.guild_id)
            .finish()
    }
}
