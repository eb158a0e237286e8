//! Plan derivation and conflict resolution
//!
//! Turns a [`SyncDiff`] into the actionable [`SyncPlan`] for one cycle.
//! Direction filters which buckets become actions; conflicts are never
//! resolved by direction alone and pass through until the caller
//! supplies per-path resolutions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use peersync_core::domain::newtypes::RelativePath;
use peersync_core::domain::plan::{ConflictFile, ConflictResolution, PlannedTransfer, SyncDiff, SyncPlan};
use peersync_core::domain::snapshot::SyncDirection;

use crate::namer::conflict_copy_path;
use crate::SyncError;

/// Derives the action list for a diff under a sync direction
///
/// The `modified` bucket already holds the winning side per the diff
/// rules; `bidirectional` uploads the one-sided local files plus the
/// modified winners and downloads the one-sided remote files. The
/// one-way directions take their own side's buckets and ignore the
/// rest. Conflicts pass through unchanged for every direction.
#[must_use]
pub fn calculate_sync_plan(diff: &SyncDiff, direction: SyncDirection) -> SyncPlan {
    let mut plan = SyncPlan {
        conflicts: diff.conflicts.clone(),
        ..SyncPlan::default()
    };

    let uploads = |plan: &mut SyncPlan, snapshots: &[_]| {
        plan.upload
            .extend(snapshots.iter().cloned().map(PlannedTransfer::in_place));
    };
    let downloads = |plan: &mut SyncPlan, snapshots: &[_]| {
        plan.download
            .extend(snapshots.iter().cloned().map(PlannedTransfer::in_place));
    };

    match direction {
        SyncDirection::Bidirectional => {
            uploads(&mut plan, &diff.local_only);
            uploads(&mut plan, &diff.modified);
            downloads(&mut plan, &diff.remote_only);
        }
        SyncDirection::UploadOnly => {
            uploads(&mut plan, &diff.local_only);
            uploads(&mut plan, &diff.modified);
        }
        SyncDirection::DownloadOnly => {
            downloads(&mut plan, &diff.remote_only);
            downloads(&mut plan, &diff.modified);
        }
    }

    debug!(
        uploads = plan.upload.len(),
        downloads = plan.download.len(),
        conflicts = plan.conflicts.len(),
        ?direction,
        "Sync plan derived"
    );
    plan
}

/// Folds caller-supplied resolutions into actions
///
/// Conflicts without a resolution, or resolved `Manual`, stay in the
/// returned plan's `conflicts`. `Local` queues an upload of the local
/// version, `Remote` a download of the remote version, and `Both` keeps
/// both edits: the local version uploads under a renamed conflict-copy
/// path while the remote version downloads under the original path.
/// `resolved_at` stamps the conflict copy names.
///
/// # Errors
/// Returns `SyncError::Domain` if a conflict copy path fails validation.
pub fn apply_conflict_resolutions(
    conflicts: &[ConflictFile],
    resolutions: &HashMap<RelativePath, ConflictResolution>,
    resolved_at: DateTime<Utc>,
) -> Result<SyncPlan, SyncError> {
    let mut plan = SyncPlan::default();

    for conflict in conflicts {
        let resolution = resolutions
            .get(&conflict.path)
            .copied()
            .or(conflict.resolution);

        match resolution {
            None | Some(ConflictResolution::Manual) => {
                plan.conflicts.push(conflict.clone());
            }
            Some(ConflictResolution::Local) => {
                plan.upload
                    .push(PlannedTransfer::in_place(conflict.local.clone()));
            }
            Some(ConflictResolution::Remote) => {
                plan.download
                    .push(PlannedTransfer::in_place(conflict.remote.clone()));
            }
            Some(ConflictResolution::Both) => {
                let copy_path = conflict_copy_path(&conflict.path, resolved_at)?;
                info!(
                    path = %conflict.path,
                    copy = %copy_path,
                    "Keeping both sides of conflict"
                );
                plan.upload.push(PlannedTransfer {
                    snapshot: conflict.local.clone(),
                    target_path: copy_path,
                });
                plan.download
                    .push(PlannedTransfer::in_place(conflict.remote.clone()));
            }
        }
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use peersync_core::domain::newtypes::{ConfigId, ContentHash};
    use peersync_core::domain::snapshot::FileSnapshot;

    fn snapshot(path: &str, hash: char) -> FileSnapshot {
        FileSnapshot {
            path: RelativePath::new(path.to_string()).unwrap(),
            name: path.rsplit('/').next().unwrap().to_string(),
            size: 100,
            last_modified: Utc.timestamp_opt(10, 0).unwrap(),
            hash: ContentHash::new(hash.to_string().repeat(64)).unwrap(),
            synced_at: None,
            config_id: ConfigId::new(),
        }
    }

    fn conflict(path: &str) -> ConflictFile {
        ConflictFile {
            path: RelativePath::new(path.to_string()).unwrap(),
            local: snapshot(path, 'a'),
            remote: snapshot(path, 'b'),
            resolution: None,
        }
    }

    fn diff_fixture() -> SyncDiff {
        SyncDiff {
            local_only: vec![snapshot("local.txt", 'a')],
            remote_only: vec![snapshot("remote.txt", 'b')],
            modified: vec![snapshot("changed.txt", 'c')],
            unchanged: vec![snapshot("same.txt", 'd')],
            conflicts: vec![conflict("fought.txt")],
        }
    }

    fn paths(transfers: &[PlannedTransfer]) -> Vec<&str> {
        transfers.iter().map(|t| t.target_path.as_str()).collect()
    }

    #[test]
    fn test_bidirectional_uploads_local_side_downloads_remote_side() {
        let plan = calculate_sync_plan(&diff_fixture(), SyncDirection::Bidirectional);

        assert_eq!(paths(&plan.upload), vec!["local.txt", "changed.txt"]);
        assert_eq!(paths(&plan.download), vec!["remote.txt"]);
        assert_eq!(plan.conflicts.len(), 1);
        assert!(plan.delete.is_empty());
    }

    #[test]
    fn test_upload_only_downloads_nothing() {
        let plan = calculate_sync_plan(&diff_fixture(), SyncDirection::UploadOnly);

        assert_eq!(paths(&plan.upload), vec!["local.txt", "changed.txt"]);
        assert!(plan.download.is_empty());
    }

    #[test]
    fn test_download_only_uploads_nothing() {
        let plan = calculate_sync_plan(&diff_fixture(), SyncDirection::DownloadOnly);

        assert!(plan.upload.is_empty());
        assert_eq!(paths(&plan.download), vec!["remote.txt", "changed.txt"]);
    }

    #[test]
    fn test_conflicts_pass_through_every_direction() {
        for direction in [
            SyncDirection::Bidirectional,
            SyncDirection::UploadOnly,
            SyncDirection::DownloadOnly,
        ] {
            let plan = calculate_sync_plan(&diff_fixture(), direction);
            assert_eq!(plan.conflicts.len(), 1, "direction {direction:?}");
        }
    }

    #[test]
    fn test_unresolved_and_manual_conflicts_stay_conflicted() {
        let conflicts = vec![conflict("a.txt"), conflict("b.txt")];
        let mut resolutions = HashMap::new();
        resolutions.insert(
            RelativePath::new("b.txt".to_string()).unwrap(),
            ConflictResolution::Manual,
        );

        let plan = apply_conflict_resolutions(&conflicts, &resolutions, Utc::now()).unwrap();

        assert_eq!(plan.conflicts.len(), 2);
        assert_eq!(plan.action_count(), 0);
    }

    #[test]
    fn test_local_resolution_queues_upload() {
        let conflicts = vec![conflict("a.txt")];
        let mut resolutions = HashMap::new();
        resolutions.insert(
            RelativePath::new("a.txt".to_string()).unwrap(),
            ConflictResolution::Local,
        );

        let plan = apply_conflict_resolutions(&conflicts, &resolutions, Utc::now()).unwrap();

        assert_eq!(plan.upload.len(), 1);
        assert_eq!(plan.upload[0].snapshot.hash, conflicts[0].local.hash);
        assert!(plan.download.is_empty());
        assert!(plan.conflicts.is_empty());
    }

    #[test]
    fn test_remote_resolution_queues_download() {
        let conflicts = vec![conflict("a.txt")];
        let mut resolutions = HashMap::new();
        resolutions.insert(
            RelativePath::new("a.txt".to_string()).unwrap(),
            ConflictResolution::Remote,
        );

        let plan = apply_conflict_resolutions(&conflicts, &resolutions, Utc::now()).unwrap();

        assert_eq!(plan.download.len(), 1);
        assert_eq!(plan.download[0].snapshot.hash, conflicts[0].remote.hash);
        assert!(plan.upload.is_empty());
    }

    #[test]
    fn test_both_resolution_renames_local_and_keeps_remote_path() {
        let conflicts = vec![conflict("docs/c.txt")];
        let mut resolutions = HashMap::new();
        resolutions.insert(
            RelativePath::new("docs/c.txt".to_string()).unwrap(),
            ConflictResolution::Both,
        );
        let at = Utc.with_ymd_and_hms(2026, 8, 29, 9, 0, 0).unwrap();

        let plan = apply_conflict_resolutions(&conflicts, &resolutions, at).unwrap();

        assert_eq!(plan.upload.len(), 1);
        assert_eq!(
            plan.upload[0].target_path.as_str(),
            "docs/c (conflict 2026-08-29 09-00-00).txt"
        );
        // The uploaded content is still the local snapshot
        assert_eq!(plan.upload[0].snapshot.hash, conflicts[0].local.hash);

        assert_eq!(plan.download.len(), 1);
        assert_eq!(plan.download[0].target_path.as_str(), "docs/c.txt");
        assert!(plan.conflicts.is_empty());
    }

    #[test]
    fn test_preset_resolution_on_conflict_used_as_fallback() {
        let mut preset = conflict("a.txt");
        preset.resolution = Some(ConflictResolution::Local);

        let plan = apply_conflict_resolutions(&[preset], &HashMap::new(), Utc::now()).unwrap();

        assert_eq!(plan.upload.len(), 1);
        assert!(plan.conflicts.is_empty());
    }
}
