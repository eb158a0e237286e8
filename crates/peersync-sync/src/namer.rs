//! Conflict copy naming
//!
//! A keep-both resolution stores the local version under a renamed path
//! next to the original. The suffix carries a second-granularity
//! timestamp so repeated resolutions of the same path on different
//! cycles never collide.

use chrono::{DateTime, Utc};

use peersync_core::domain::errors::DomainError;
use peersync_core::domain::newtypes::RelativePath;

/// Format of the timestamp embedded in a conflict copy name
const CONFLICT_TAG_FORMAT: &str = "%Y-%m-%d %H-%M-%S";

/// Derives the renamed path for the local side of a keep-both conflict
///
/// The stem is preserved and the extension kept in place:
/// `docs/notes.txt` becomes
/// `docs/notes (conflict 2026-08-29 14-03-07).txt`.
///
/// # Errors
/// Returns `DomainError::InvalidPath` if the renamed path fails
/// validation, which only happens for degenerate inputs.
pub fn conflict_copy_path(
    path: &RelativePath,
    at: DateTime<Utc>,
) -> Result<RelativePath, DomainError> {
    let file_name = path.file_name();
    let tag = at.format(CONFLICT_TAG_FORMAT);

    let renamed = match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => {
            format!("{stem} (conflict {tag}).{extension}")
        }
        // Dotfiles and extensionless names take the suffix at the end
        _ => format!("{file_name} (conflict {tag})"),
    };

    path.with_file_name(&renamed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 29, 14, 3, 7).unwrap()
    }

    #[test]
    fn test_extension_preserved_after_suffix() {
        let path = RelativePath::new("notes.txt".to_string()).unwrap();
        let renamed = conflict_copy_path(&path, at()).unwrap();
        assert_eq!(renamed.as_str(), "notes (conflict 2026-08-29 14-03-07).txt");
    }

    #[test]
    fn test_parent_directory_preserved() {
        let path = RelativePath::new("docs/deep/notes.txt".to_string()).unwrap();
        let renamed = conflict_copy_path(&path, at()).unwrap();
        assert_eq!(
            renamed.as_str(),
            "docs/deep/notes (conflict 2026-08-29 14-03-07).txt"
        );
    }

    #[test]
    fn test_extensionless_name_suffixed_at_end() {
        let path = RelativePath::new("Makefile".to_string()).unwrap();
        let renamed = conflict_copy_path(&path, at()).unwrap();
        assert_eq!(renamed.as_str(), "Makefile (conflict 2026-08-29 14-03-07)");
    }

    #[test]
    fn test_dotfile_keeps_leading_dot() {
        let path = RelativePath::new("config/.env".to_string()).unwrap();
        let renamed = conflict_copy_path(&path, at()).unwrap();
        assert_eq!(renamed.as_str(), "config/.env (conflict 2026-08-29 14-03-07)");
    }

    #[test]
    fn test_distinct_seconds_produce_distinct_names() {
        let path = RelativePath::new("notes.txt".to_string()).unwrap();
        let first = conflict_copy_path(&path, at()).unwrap();
        let second =
            conflict_copy_path(&path, at() + chrono::Duration::seconds(1)).unwrap();
        assert_ne!(first, second);
    }
}
