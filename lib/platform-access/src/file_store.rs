//! JSON-file backend for all gate stores.
//!
//! The whole state lives in one document on disk. Every mutation is a
//! read-modify-write under a process-local lock, written to a sibling
//! temporary file and renamed into place so readers never see a torn file.
//! Concurrent processes sharing the file get "last writer wins".

use async_trait::async_trait;
use chrono::Utc;
use gatehouse_core::{Result, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::allow_list::AllowList;
use crate::error::StoreError;
use crate::session::Session;
use crate::settings::DiscordSettings;
use crate::store::{AllowListStore, SessionStore, SettingsStore};

/// On-disk document layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    settings: DiscordSettings,
    /// Kept raw so a hand-edited or corrupt value degrades to "deny everyone".
    #[serde(default)]
    allowed_admins: Option<serde_json::Value>,
    #[serde(default)]
    sessions: BTreeMap<String, Session>,
}

/// Gate stores backed by a single JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Opens a store at `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Document, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::default()),
            Err(e) => {
                return Err(StoreError::Io {
                    path: self.path.display().to_string(),
                    details: e.to_string(),
                }
                .into());
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Document::default());
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            StoreError::Serialization {
                details: format!("{}: {e}", self.path.display()),
            }
            .into()
        })
    }

    async fn write(&self, document: &Document) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(document).map_err(|e| StoreError::Serialization {
            details: e.to_string(),
        })?;

        let io_error = |e: std::io::Error| StoreError::Io {
            path: self.path.display().to_string(),
            details: e.to_string(),
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, bytes).await.map_err(io_error)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_error)?;
        Ok(())
    }

    async fn update<T>(&self, f: impl FnOnce(&mut Document) -> T + Send) -> Result<T, StoreError>
    where
        T: Send,
    {
        let _guard = self.lock.lock().await;
        let mut document = self.read().await?;
        let out = f(&mut document);
        self.write(&document).await?;
        Ok(out)
    }
}

#[async_trait]
impl AllowListStore for JsonFileStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load_allow_list(&self) -> Result<AllowList, StoreError> {
        let _guard = self.lock.lock().await;
        let document = self.read().await?;
        Ok(AllowList::from_value(document.allowed_admins.as_ref()))
    }

    #[instrument(skip(self, allow_list), fields(count = allow_list.len()))]
    async fn save_allow_list(&self, allow_list: &AllowList) -> Result<(), StoreError> {
        let value = allow_list.to_value();
        self.update(move |doc| doc.allowed_admins = Some(value))
            .await?;
        debug!("allow-list saved");
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn load_settings(&self) -> Result<DiscordSettings, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.settings)
    }

    #[instrument(skip(self, settings))]
    async fn save_settings(&self, settings: &DiscordSettings) -> Result<(), StoreError> {
        let settings = settings.clone();
        self.update(move |doc| doc.settings = settings).await?;
        debug!("settings saved");
        Ok(())
    }

    #[instrument(skip(self, settings, allow_list), fields(count = allow_list.len()))]
    async fn initialize(
        &self,
        settings: &DiscordSettings,
        allow_list: &AllowList,
    ) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.read().await?;
        if document.settings.is_configured() {
            return Ok(false);
        }

        document.settings = settings.clone();
        document.allowed_admins = Some(allow_list.to_value());
        self.write(&document).await?;
        debug!("settings and allow-list initialized");
        Ok(true)
    }
}

#[async_trait]
impl SessionStore for JsonFileStore {
    #[instrument(skip(self, session), fields(session_id = %session.id()))]
    async fn create(&self, session: &Session) -> Result<(), StoreError> {
        let session = session.clone();
        self.update(move |doc| {
            doc.sessions.insert(session.id().to_string(), session);
        })
        .await
    }

    async fn find_by_id(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.read().await?;
        Ok(document.sessions.remove(&id.to_string()))
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: SessionId) -> Result<(), StoreError> {
        let removed = self
            .update(move |doc| doc.sessions.remove(&id.to_string()).is_some())
            .await?;
        debug!(removed, "session delete");
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        self.update(move |doc| {
            let before = doc.sessions.len();
            doc.sessions.retain(|_, s| s.expires_at() > now);
            (before - doc.sessions.len()) as u64
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::session::BearerCredential;
    use chrono::Duration;

    fn store_in(dir: &tempfile::TempDir) -> JsonFileStore {
        JsonFileStore::new(dir.path().join("gate.json"))
    }

    fn session(id: &str, duration: Duration) -> Session {
        Session::new(
            Identity::new(id, "alice", Some("avatarhash".to_string())),
            BearerCredential::new("Bearer", "tok"),
            duration,
        )
    }

    #[tokio::test]
    async fn missing_file_reads_as_unconfigured() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);

        assert!(store.load_allow_list().await.expect("load").is_empty());
        assert!(!store.load_settings().await.expect("load").is_configured());
        assert!(store
            .find_by_id(SessionId::new())
            .await
            .expect("find")
            .is_none());
    }

    #[tokio::test]
    async fn session_survives_a_fresh_store_instance() {
        let dir = tempfile::tempdir().expect("tempdir");
        let original = session("111", Duration::hours(1));

        store_in(&dir).create(&original).await.expect("create");

        let restored = store_in(&dir)
            .find_by_id(original.id())
            .await
            .expect("find")
            .expect("session should exist");

        assert_eq!(restored.identity().id(), "111");
        assert_eq!(restored.identity().username(), "alice");
        assert_eq!(restored.identity().avatar(), Some("avatarhash"));
        assert_eq!(restored.identity(), original.identity());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        let s = session("111", Duration::hours(1));
        store.create(&s).await.expect("create");

        store.delete(s.id()).await.expect("first delete");
        store.delete(s.id()).await.expect("second delete");
        assert!(store.find_by_id(s.id()).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn delete_expired_only_removes_expired() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        let live = session("111", Duration::hours(1));
        let dead = session("222", Duration::seconds(-5));
        store.create(&live).await.expect("create");
        store.create(&dead).await.expect("create");

        assert_eq!(store.delete_expired().await.expect("cleanup"), 1);
        assert!(store.find_by_id(live.id()).await.expect("find").is_some());
        assert!(store.find_by_id(dead.id()).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn allow_list_and_settings_are_independent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);

        let list: AllowList = ["111", "222"].into_iter().collect();
        store.save_allow_list(&list).await.expect("save list");
        store
            .save_settings(&DiscordSettings {
                client_id: Some("app".to_string()),
                client_secret: None,
                guild_id: None,
            })
            .await
            .expect("save settings");

        let reopened = store_in(&dir);
        assert_eq!(reopened.load_allow_list().await.expect("load"), list);
        assert_eq!(
            reopened.load_settings().await.expect("load").client_id(),
            Some("app")
        );
    }

    #[tokio::test]
    async fn initialize_writes_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        let settings = |id: &str| DiscordSettings {
            client_id: Some(id.to_string()),
            ..Default::default()
        };

        let first: AllowList = ["111"].into_iter().collect();
        let second: AllowList = ["999"].into_iter().collect();
        assert!(store.initialize(&settings("app"), &first).await.expect("init"));
        assert!(!store.initialize(&settings("other"), &second).await.expect("init"));

        assert_eq!(store.load_allow_list().await.expect("load"), first);
        assert_eq!(
            store.load_settings().await.expect("load").client_id(),
            Some("app")
        );
    }

    #[tokio::test]
    async fn initialize_replaces_allow_list_left_without_client_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        store
            .save_allow_list(&["stale"].into_iter().collect())
            .await
            .expect("save");

        let list: AllowList = ["111"].into_iter().collect();
        let settings = DiscordSettings {
            client_id: Some("app".to_string()),
            ..Default::default()
        };
        assert!(store.initialize(&settings, &list).await.expect("init"));
        assert_eq!(store.load_allow_list().await.expect("load"), list);
    }

    #[tokio::test]
    async fn malformed_allow_list_denies_everyone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gate.json");
        tokio::fs::write(&path, r#"{"allowed_admins": {"111": true}}"#)
            .await
            .expect("write");

        let store = JsonFileStore::new(&path);
        assert!(store.load_allow_list().await.expect("load").is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gate.json");
        tokio::fs::write(&path, "{not json").await.expect("write");

        let store = JsonFileStore::new(&path);
        assert!(store.load_settings().await.is_err());
    }
}
