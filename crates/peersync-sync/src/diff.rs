//! Snapshot comparison
//!
//! Partitions the union of a local and a remote snapshot set into the
//! five [`SyncDiff`] buckets. A path conflicts only when both sides
//! changed it since their own last sync; a one-sided change goes to
//! `modified` carrying the newer snapshot as the version to propagate.

use std::collections::HashMap;

use tracing::debug;

use peersync_core::domain::plan::{ConflictFile, SyncDiff};
use peersync_core::domain::snapshot::FileSnapshot;

/// Compares two snapshot sets path by path
///
/// Every input path lands in exactly one bucket. Equal hashes mean
/// `unchanged` regardless of timestamps. On differing hashes the entry
/// conflicts when both sides are modified since their own `synced_at`;
/// otherwise `modified` holds the side with the greater `last_modified`,
/// local winning ties.
#[must_use]
pub fn compare_snapshots(local: &[FileSnapshot], remote: &[FileSnapshot]) -> SyncDiff {
    let remote_by_path: HashMap<_, _> = remote.iter().map(|s| (&s.path, s)).collect();
    let local_by_path: HashMap<_, _> = local.iter().map(|s| (&s.path, s)).collect();

    let mut diff = SyncDiff::default();

    for local_file in local {
        let Some(remote_file) = remote_by_path.get(&local_file.path).copied() else {
            diff.local_only.push(local_file.clone());
            continue;
        };

        if local_file.hash == remote_file.hash {
            diff.unchanged.push(local_file.clone());
        } else if local_file.modified_since_sync() && remote_file.modified_since_sync() {
            diff.conflicts.push(ConflictFile {
                path: local_file.path.clone(),
                local: local_file.clone(),
                remote: remote_file.clone(),
                resolution: None,
            });
        } else if remote_file.last_modified > local_file.last_modified {
            diff.modified.push(remote_file.clone());
        } else {
            // Local wins ties
            diff.modified.push(local_file.clone());
        }
    }

    for remote_file in remote {
        if !local_by_path.contains_key(&remote_file.path) {
            diff.remote_only.push(remote_file.clone());
        }
    }

    debug!(
        local_only = diff.local_only.len(),
        remote_only = diff.remote_only.len(),
        modified = diff.modified.len(),
        unchanged = diff.unchanged.len(),
        conflicts = diff.conflicts.len(),
        "Snapshot comparison done"
    );
    diff
}
