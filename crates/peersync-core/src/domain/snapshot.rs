//! File snapshots, sync configurations, and live sync state
//!
//! A [`FileSnapshot`] records one file's observed state and is immutable:
//! a change produces a new snapshot that supersedes the old one. Snapshots
//! are uniquely keyed by `(config_id, path)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{ConfigId, ContentHash, PeerId, RelativePath, SessionId};
use super::plan::ConflictResolution;

/// One file's state at its last observation instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    /// Path relative to the sync folder root
    pub path: RelativePath,
    /// File name (final path component, denormalized for display)
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time observed on this side
    pub last_modified: DateTime<Utc>,
    /// Content digest at observation time
    pub hash: ContentHash,
    /// When this file last took part in a successful sync, if ever
    pub synced_at: Option<DateTime<Utc>>,
    /// The sync relationship this snapshot belongs to
    pub config_id: ConfigId,
}

impl FileSnapshot {
    /// Whether this file changed since it last synced
    ///
    /// Files that never synced count as modified.
    #[must_use]
    pub fn modified_since_sync(&self) -> bool {
        match self.synced_at {
            Some(synced_at) => self.last_modified > synced_at,
            None => true,
        }
    }
}

/// Direction of a sync relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncDirection {
    /// Propagate changes both ways
    Bidirectional,
    /// Only push local changes to the peer
    UploadOnly,
    /// Only pull remote changes from the peer
    DownloadOnly,
}

/// One durable sync relationship between a local folder and a remote peer
///
/// Created by the user action "add sync"; deactivated or deleted
/// explicitly. `last_synced_at` advances only after a successful cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub id: ConfigId,
    /// Opaque reference to the local folder (directory handle name)
    pub local_folder: String,
    pub peer_id: PeerId,
    pub session_id: SessionId,
    pub direction: SyncDirection,
    /// Default resolution applied to conflicts when none is supplied per file
    pub conflict_resolution: ConflictResolution,
    pub created_at: DateTime<Utc>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl SyncConfig {
    /// Creates a new active config with `Manual` conflict handling
    #[must_use]
    pub fn new(
        local_folder: String,
        peer_id: PeerId,
        session_id: SessionId,
        direction: SyncDirection,
    ) -> Self {
        Self {
            id: ConfigId::new(),
            local_folder,
            peer_id,
            session_id,
            direction,
            conflict_resolution: ConflictResolution::Manual,
            created_at: Utc::now(),
            last_synced_at: None,
            is_active: true,
        }
    }

    /// Records a successful sync cycle completion
    pub fn record_sync(&mut self, at: DateTime<Utc>) {
        self.last_synced_at = Some(at);
    }
}

/// Live status of one sync relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    Synced,
    OutOfSync,
    Syncing,
    Error,
    Conflict,
    Offline,
}

/// Per-config live state, recomputed as sync cycles run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    pub config_id: ConfigId,
    pub local_snapshot: Vec<FileSnapshot>,
    pub remote_snapshot: Vec<FileSnapshot>,
    pub status: SyncStatus,
    pub last_checked_at: DateTime<Utc>,
    /// Number of planned actions not yet executed
    pub pending_changes: u32,
    pub error: Option<String>,
}

impl SyncState {
    /// Creates an initial state for a config that hasn't checked yet
    #[must_use]
    pub fn new(config_id: ConfigId) -> Self {
        Self {
            config_id,
            local_snapshot: Vec::new(),
            remote_snapshot: Vec::new(),
            status: SyncStatus::OutOfSync,
            last_checked_at: Utc::now(),
            pending_changes: 0,
            error: None,
        }
    }
}
