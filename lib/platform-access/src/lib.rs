//! Discord-identity authorization for the gatehouse admin backend.
//!
//! This crate provides:
//! - The normalized Discord `Identity` and the tolerant `AllowList`
//! - `Session` and `BearerCredential` types
//! - The `AuthorizationGate`: begin login, complete login, check, logout
//! - Store traits and a JSON-file backend
//!
//! # Access Control Model
//!
//! A single rule: a session exists only if the identity's id was on the
//! allow-list when the session was created. There are no roles; holding a
//! session means holding admin access.
//!
//! # Example
//!
//! ```
//! use gatehouse_platform_access::{AllowList, Identity};
//!
//! let allow_list = AllowList::from_value(Some(&serde_json::json!(["111", "222"])));
//! assert!(allow_list.permits(&Identity::new("111", "alice", None)));
//! assert!(!allow_list.permits(&Identity::new("333", "mallory", None)));
//!
//! // Anything that is not a list of strings denies everyone.
//! let corrupt = AllowList::from_value(Some(&serde_json::json!({"111": true})));
//! assert!(!corrupt.permits(&Identity::new("111", "alice", None)));
//! ```

pub mod allow_list;
pub mod auth;
pub mod error;
pub mod file_store;
pub mod gate;
pub mod identity;
pub mod session;
pub mod settings;
pub mod store;

// Re-export main types at crate root
pub use allow_list::AllowList;
pub use auth::{AuthenticatedAdmin, CallbackPayload, IdentityProvider, LoginInitiation};
pub use error::{AuthenticationError, AuthorizationError, StoreError};
pub use file_store::JsonFileStore;
pub use gate::AuthorizationGate;
pub use identity::Identity;
pub use session::{BearerCredential, Session};
pub use settings::{DiscordSettings, LoginFlow, ProviderConfig};
pub use store::{AllowListStore, GateStore, SessionStore, SettingsStore};
