//! Filesystem move seam for the confirm step.
//!
//! The pipeline renames through this trait so tests can fail moves without
//! touching the disk.

use std::path::Path;

pub trait FileMover: Send + Sync {
    /// Move `from` to `to`. Refuses to overwrite an existing destination.
    fn rename(&self, from: &Path, to: &Path) -> Result<(), String>;
}

/// `std::fs::rename` with an overwrite guard. Both paths stay on the same
/// filesystem in practice since the destination is the source's directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsMover;

impl FileMover for FsMover {
    fn rename(&self, from: &Path, to: &Path) -> Result<(), String> {
        if to.exists() {
            return Err(format!("Destination already exists: {}", to.display()));
        }
        std::fs::rename(from, to).map_err(|err| err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_rename_moves_file() {
        let dir = tempdir().unwrap();
        let from = dir.path().join("draft.txt");
        let to = dir.path().join("2024-01-15_report.txt");
        std::fs::write(&from, "contents").unwrap();

        FsMover.rename(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(std::fs::read_to_string(&to).unwrap(), "contents");
    }

    #[test]
    fn test_rename_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let from = dir.path().join("a.txt");
        let to = dir.path().join("b.txt");
        std::fs::write(&from, "a").unwrap();
        std::fs::write(&to, "b").unwrap();

        let err = FsMover.rename(&from, &to).unwrap_err();
        assert!(err.contains("exists"), "unexpected error: {}", err);
        assert_eq!(std::fs::read_to_string(&to).unwrap(), "b");
    }

    #[test]
    fn test_rename_missing_source_fails() {
        let dir = tempdir().unwrap();
        let from = dir.path().join("absent.txt");
        let to = dir.path().join("dest.txt");
        assert!(FsMover.rename(&from, &to).is_err());
    }
}
