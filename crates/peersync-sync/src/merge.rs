//! Post-sync baseline merge

use std::collections::HashMap;

use peersync_core::domain::newtypes::RelativePath;
use peersync_core::domain::snapshot::FileSnapshot;

/// Unions two snapshot sets into the post-sync baseline
///
/// Keyed by path; a remote entry replaces its local counterpart only
/// when strictly newer, so equal timestamps keep the local version.
/// Merging a set with itself returns the same set, and the outcome is
/// order-independent whenever timestamps are distinct.
#[must_use]
pub fn merge_snapshots(local: &[FileSnapshot], remote: &[FileSnapshot]) -> Vec<FileSnapshot> {
    let mut merged: HashMap<RelativePath, FileSnapshot> = local
        .iter()
        .map(|s| (s.path.clone(), s.clone()))
        .collect();

    for remote_file in remote {
        match merged.get(&remote_file.path) {
            Some(existing) if remote_file.last_modified <= existing.last_modified => {}
            _ => {
                merged.insert(remote_file.path.clone(), remote_file.clone());
            }
        }
    }

    let mut result: Vec<FileSnapshot> = merged.into_values().collect();
    // Deterministic output order for callers that diff or display it
    result.sort_by(|a, b| a.path.cmp(&b.path));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use peersync_core::domain::newtypes::{ConfigId, ContentHash};

    fn snapshot(path: &str, hash: char, modified: i64) -> FileSnapshot {
        FileSnapshot {
            path: RelativePath::new(path.to_string()).unwrap(),
            name: path.rsplit('/').next().unwrap().to_string(),
            size: 100,
            last_modified: Utc.timestamp_opt(modified, 0).unwrap(),
            hash: ContentHash::new(hash.to_string().repeat(64)).unwrap(),
            synced_at: None,
            config_id: ConfigId::new(),
        }
    }

    #[test]
    fn test_union_keeps_one_sided_entries() {
        let local = vec![snapshot("a.txt", 'a', 10)];
        let remote = vec![snapshot("b.txt", 'b', 10)];

        let merged = merge_snapshots(&local, &remote);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].path.as_str(), "a.txt");
        assert_eq!(merged[1].path.as_str(), "b.txt");
    }

    #[test]
    fn test_strictly_newer_remote_wins() {
        let local = vec![snapshot("a.txt", 'a', 10)];
        let remote = vec![snapshot("a.txt", 'b', 11)];

        let merged = merge_snapshots(&local, &remote);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].hash, remote[0].hash);
    }

    #[test]
    fn test_equal_timestamps_keep_local() {
        let local = vec![snapshot("a.txt", 'a', 10)];
        let remote = vec![snapshot("a.txt", 'b', 10)];

        let merged = merge_snapshots(&local, &remote);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].hash, local[0].hash);
    }

    #[test]
    fn test_older_remote_loses() {
        let local = vec![snapshot("a.txt", 'a', 10)];
        let remote = vec![snapshot("a.txt", 'b', 5)];

        let merged = merge_snapshots(&local, &remote);
        assert_eq!(merged[0].hash, local[0].hash);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let local = vec![snapshot("a.txt", 'a', 10), snapshot("b.txt", 'b', 3)];
        let remote = vec![snapshot("a.txt", 'c', 12), snapshot("c.txt", 'd', 7)];

        let once = merge_snapshots(&local, &remote);
        let twice = merge_snapshots(&once, &once);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_order_independent_for_distinct_timestamps() {
        let a = vec![snapshot("x.txt", 'a', 10), snapshot("y.txt", 'b', 3)];
        let b = vec![snapshot("x.txt", 'c', 12), snapshot("z.txt", 'd', 7)];

        assert_eq!(merge_snapshots(&a, &b), merge_snapshots(&b, &a));
    }
}
