//! Diff, plan, and conflict types
//!
//! A [`SyncDiff`] partitions the union of local and remote snapshots into
//! five disjoint buckets; a [`SyncPlan`] is the actionable output for one
//! sync cycle, consumed once by the execution step and then discarded.
//! The algorithms producing these live in `peersync-sync`.

use serde::{Deserialize, Serialize};

use super::newtypes::RelativePath;
use super::snapshot::FileSnapshot;

/// Partition of local and remote snapshot sets
///
/// Every input path appears in exactly one bucket. `modified` holds the
/// representative ("winning") snapshot to propagate; `conflicts` holds
/// paths changed on both sides since their last sync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncDiff {
    pub local_only: Vec<FileSnapshot>,
    pub remote_only: Vec<FileSnapshot>,
    pub modified: Vec<FileSnapshot>,
    pub unchanged: Vec<FileSnapshot>,
    pub conflicts: Vec<ConflictFile>,
}

impl SyncDiff {
    /// Total number of paths represented across all buckets
    #[must_use]
    pub fn path_count(&self) -> usize {
        self.local_only.len()
            + self.remote_only.len()
            + self.modified.len()
            + self.unchanged.len()
            + self.conflicts.len()
    }

    /// Whether the two sides are identical
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.local_only.is_empty()
            && self.remote_only.is_empty()
            && self.modified.is_empty()
            && self.conflicts.is_empty()
    }
}

/// Resolution choice for a conflicted path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictResolution {
    /// Keep the local version (upload it)
    Local,
    /// Keep the remote version (download it)
    Remote,
    /// Keep both: upload a renamed local copy, download the remote original
    Both,
    /// Leave unresolved, waiting for the user
    Manual,
}

/// A path changed on both sides since the last successful sync
///
/// Exists only while the path is in dispute; removed once resolved into
/// plan actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictFile {
    pub path: RelativePath,
    pub local: FileSnapshot,
    pub remote: FileSnapshot,
    pub resolution: Option<ConflictResolution>,
}

/// One planned file movement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedTransfer {
    /// Snapshot of the version to move
    pub snapshot: FileSnapshot,
    /// Path to store the file under on the receiving side
    ///
    /// Differs from `snapshot.path` only for keep-both conflict copies.
    pub target_path: RelativePath,
}

impl PlannedTransfer {
    /// A transfer that keeps the snapshot's own path
    #[must_use]
    pub fn in_place(snapshot: FileSnapshot) -> Self {
        let target_path = snapshot.path.clone();
        Self {
            snapshot,
            target_path,
        }
    }
}

/// Actionable output of one sync cycle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncPlan {
    pub upload: Vec<PlannedTransfer>,
    pub download: Vec<PlannedTransfer>,
    pub delete: Vec<RelativePath>,
    /// Conflicts still awaiting a resolution
    pub conflicts: Vec<ConflictFile>,
}

impl SyncPlan {
    /// Total number of pending actions (excluding unresolved conflicts)
    #[must_use]
    pub fn action_count(&self) -> usize {
        self.upload.len() + self.download.len() + self.delete.len()
    }

    /// Whether there is nothing to do and nothing in dispute
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.action_count() == 0 && self.conflicts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::newtypes::{ConfigId, ContentHash};
    use chrono::Utc;

    fn snapshot(path: &str) -> FileSnapshot {
        FileSnapshot {
            path: RelativePath::new(path.to_string()).unwrap(),
            name: path.rsplit('/').next().unwrap().to_string(),
            size: 1,
            last_modified: Utc::now(),
            hash: ContentHash::new(
                "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_string(),
            )
            .unwrap(),
            synced_at: None,
            config_id: ConfigId::new(),
        }
    }

    #[test]
    fn test_empty_diff_is_clean() {
        let diff = SyncDiff::default();
        assert!(diff.is_clean());
        assert_eq!(diff.path_count(), 0);
    }

    #[test]
    fn test_diff_with_local_only_not_clean() {
        let diff = SyncDiff {
            local_only: vec![snapshot("a.txt")],
            ..SyncDiff::default()
        };
        assert!(!diff.is_clean());
        assert_eq!(diff.path_count(), 1);
    }

    #[test]
    fn test_in_place_transfer_keeps_path() {
        let snap = snapshot("docs/a.txt");
        let transfer = PlannedTransfer::in_place(snap.clone());
        assert_eq!(transfer.target_path, snap.path);
    }

    #[test]
    fn test_plan_counts() {
        let plan = SyncPlan {
            upload: vec![PlannedTransfer::in_place(snapshot("a.txt"))],
            download: vec![PlannedTransfer::in_place(snapshot("b.txt"))],
            delete: vec![RelativePath::new("c.txt".to_string()).unwrap()],
            conflicts: Vec::new(),
        };
        assert_eq!(plan.action_count(), 3);
        assert!(!plan.is_empty());
    }

    #[test]
    fn test_resolution_serde_kebab_case() {
        let json = serde_json::to_string(&ConflictResolution::Both).unwrap();
        assert_eq!(json, "\"both\"");
    }
}
