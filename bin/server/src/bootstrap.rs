//! Seeds an unconfigured store from `BOOTSTRAP__*` environment values.

use gatehouse_core::Result;
use gatehouse_platform_access::{GateStore, StoreError};
use tracing::{info, warn};

use crate::config::BootstrapConfig;

/// Writes the bootstrap settings and allow-list if the store has no client id.
///
/// Returns true if anything was written. A store that is already configured
/// is never touched, and neither is one whose bootstrap allow-list is empty.
///
/// # Errors
///
/// Returns an error if the store cannot be read or written.
pub async fn apply(store: &dyn GateStore, bootstrap: &BootstrapConfig) -> Result<bool, StoreError> {
    let Some(settings) = bootstrap.settings() else {
        return Ok(false);
    };

    let allow_list = bootstrap.allow_list();
    if allow_list.is_empty() {
        warn!("Bootstrap client id given without allowed admins, skipping");
        return Ok(false);
    }

    if !store.initialize(&settings, &allow_list).await? {
        info!("Store already configured, ignoring bootstrap values");
        return Ok(false);
    }

    info!(admins = allow_list.len(), "Seeded store from bootstrap configuration");
    Ok(true)
}
