//! Persisted peer identity
//!
//! The relay identifies peers by a stable string so repeated launches do
//! not appear as new peers. The identity is generated on first launch,
//! written to a small file under the local data directory, and cached in
//! process-wide state with a documented lifecycle: initialized once at
//! startup, read-only thereafter, with an explicit reset hook for tests.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::Context;
use tracing::{debug, info};

use crate::domain::newtypes::PeerId;

/// Process-wide identity cache. Written once by [`load_or_create`] (or by
/// the test reset hook), read everywhere else.
static IDENTITY: RwLock<Option<PeerId>> = RwLock::new(None);

/// Platform-appropriate default path for the identity file.
///
/// Typically `$XDG_DATA_HOME/peersync/identity` on Linux.
#[must_use]
pub fn default_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("peersync")
        .join("identity")
}

/// Returns the cached identity, if one has been loaded this process.
#[must_use]
pub fn cached() -> Option<PeerId> {
    IDENTITY.read().ok().and_then(|guard| guard.clone())
}

/// Loads the persisted peer identity, creating and persisting a fresh one
/// on first launch. Subsequent calls return the cached value.
///
/// # Errors
/// Returns an error if the identity file exists but is unreadable or
/// malformed, or if a fresh identity cannot be written.
pub fn load_or_create(path: &Path) -> anyhow::Result<PeerId> {
    if let Some(id) = cached() {
        return Ok(id);
    }

    let id = if path.exists() {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read identity file: {}", path.display()))?;
        let id = PeerId::new(raw.trim().to_string())
            .with_context(|| format!("Corrupt identity file: {}", path.display()))?;
        debug!(peer_id = %id, "Loaded persisted peer identity");
        id
    } else {
        let id = PeerId::generate();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, id.as_str())
            .with_context(|| format!("Failed to persist identity to {}", path.display()))?;
        info!(peer_id = %id, path = %path.display(), "Generated new peer identity");
        id
    };

    if let Ok(mut guard) = IDENTITY.write() {
        *guard = Some(id.clone());
    }

    Ok(id)
}

/// Clears the process-wide identity cache.
///
/// Test hook only; production code initializes the identity once at
/// startup and never resets it.
pub fn reset_for_tests() {
    if let Ok(mut guard) = IDENTITY.write() {
        *guard = None;
    }
}
