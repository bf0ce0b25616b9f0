//! Discord identity resolved during login.
//!
//! An `Identity` is created transiently per login attempt from the
//! provider's profile response and is immutable for the life of a session.

use serde::{Deserialize, Serialize};

/// Base URL of Discord's avatar CDN.
const AVATAR_CDN: &str = "https://cdn.discordapp.com/avatars";

/// The normalized `{ id, username, avatar }` record of a Discord user.
///
/// Unknown fields in the profile response are ignored, so the `/users/@me`
/// body deserializes directly into this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque Discord user id (a snowflake, kept as a string).
    id: String,
    /// Display name.
    username: String,
    /// Avatar hash, if the user has set one.
    #[serde(default)]
    avatar: Option<String>,
}

impl Identity {
    /// Creates an identity.
    #[must_use]
    pub fn new(id: impl Into<String>, username: impl Into<String>, avatar: Option<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            avatar,
        }
    }

    /// Returns the opaque user id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the avatar hash, if any.
    #[must_use]
    pub fn avatar(&self) -> Option<&str> {
        self.avatar.as_deref()
    }

    /// Returns the CDN URL of the avatar image, if the user has one.
    #[must_use]
    pub fn avatar_url(&self) -> Option<String> {
        self.avatar
            .as_ref()
            .map(|hash| format!("{AVATAR_CDN}/{}/{hash}.png", self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avatar_url_uses_id_and_hash() {
        let identity = Identity::new("111", "alice", Some("abc123".to_string()));
        assert_eq!(
            identity.avatar_url().as_deref(),
            Some("https://cdn.discordapp.com/avatars/111/abc123.png")
        );
    }

    #[test]
    fn no_avatar_no_url() {
        let identity = Identity::new("111", "alice", None);
        assert!(identity.avatar().is_none());
        assert!(identity.avatar_url().is_none());
    }

    #[test]
    fn deserializes_discord_profile() {
        let json = r#"{
            "id": "80351110224678912",
            "username": "Nelly",
            "discriminator": "0",
            "avatar": "8342729096ea3675442027381ff50dfe",
            "verified": true
        }"#;

        let identity: Identity = serde_json::from_str(json).expect("deserialize");
        assert_eq!(identity.id(), "80351110224678912");
        assert_eq!(identity.username(), "Nelly");
        assert_eq!(identity.avatar(), Some("8342729096ea3675442027381ff50dfe"));
    }

    #[test]
    fn deserializes_null_avatar() {
        let json = r#"{"id": "1", "username": "bob", "avatar": null}"#;
        let identity: Identity = serde_json::from_str(json).expect("deserialize");
        assert!(identity.avatar().is_none());

        let json = r#"{"id": "1", "username": "bob"}"#;
        let identity: Identity = serde_json::from_str(json).expect("deserialize");
        assert!(identity.avatar().is_none());
    }
}
