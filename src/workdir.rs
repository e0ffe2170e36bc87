//! Working directory inspection and cleanup
//!
//! The working directory holds exactly one repository's working tree. Its
//! state is classified from scratch on every run and never cached.

use std::path::Path;
use tracing::debug;

use crate::error::SyncError;

const GIT_METADATA: &str = ".git";

/// Classification of the working directory before reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkingDirectoryState {
    /// No VCS metadata and no entries (or the directory does not exist yet)
    Uninitialized,
    /// Entries present but no VCS metadata
    UntrackedContent,
    /// VCS metadata present
    ExistingRepository,
}

/// Classify the working directory. Has no side effects.
pub async fn inspect(path: &Path) -> Result<WorkingDirectoryState, SyncError> {
    let metadata_present = tokio::fs::try_exists(path.join(GIT_METADATA))
        .await
        .map_err(|e| SyncError::filesystem("inspect working directory", e))?;

    if metadata_present {
        return Ok(WorkingDirectoryState::ExistingRepository);
    }

    if !tokio::fs::try_exists(path)
        .await
        .map_err(|e| SyncError::filesystem("inspect working directory", e))?
    {
        return Ok(WorkingDirectoryState::Uninitialized);
    }

    let mut entries = tokio::fs::read_dir(path)
        .await
        .map_err(|e| SyncError::filesystem("read working directory", e))?;

    let has_entries = entries
        .next_entry()
        .await
        .map_err(|e| SyncError::filesystem("read working directory", e))?
        .is_some();

    if has_entries {
        Ok(WorkingDirectoryState::UntrackedContent)
    } else {
        Ok(WorkingDirectoryState::Uninitialized)
    }
}

/// Delete every file and subdirectory inside `path`, keeping `path` itself
pub async fn clear_contents(path: &Path) -> Result<usize, SyncError> {
    let mut entries = tokio::fs::read_dir(path)
        .await
        .map_err(|e| SyncError::filesystem("clean working directory", e))?;

    let mut removed = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| SyncError::filesystem("clean working directory", e))?
    {
        let entry_path = entry.path();
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| SyncError::filesystem("clean working directory", e))?;

        // Symlinks to directories are unlinked, never followed
        let result = if file_type.is_dir() {
            tokio::fs::remove_dir_all(&entry_path).await
        } else {
            tokio::fs::remove_file(&entry_path).await
        };

        result.map_err(|e| {
            SyncError::filesystem(
                "clean working directory",
                format!("{}: {}", entry_path.display(), e),
            )
        })?;

        debug!("Removed stale entry {}", entry_path.display());
        removed += 1;
    }

    Ok(removed)
}

/// Create the working directory if it does not exist yet
pub async fn ensure_exists(path: &Path) -> Result<(), SyncError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| SyncError::filesystem("create working directory", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use predicates::prelude::*;

    #[tokio::test]
    async fn test_empty_directory_is_uninitialized() {
        let temp = assert_fs::TempDir::new().unwrap();
        let state = inspect(temp.path()).await.unwrap();
        assert_eq!(state, WorkingDirectoryState::Uninitialized);
    }

    #[tokio::test]
    async fn test_missing_directory_is_uninitialized() {
        let temp = assert_fs::TempDir::new().unwrap();
        let state = inspect(&temp.path().join("not-created")).await.unwrap();
        assert_eq!(state, WorkingDirectoryState::Uninitialized);
    }

    #[tokio::test]
    async fn test_files_without_metadata_are_untracked() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("junk.txt").write_str("stale").unwrap();

        let state = inspect(temp.path()).await.unwrap();
        assert_eq!(state, WorkingDirectoryState::UntrackedContent);
    }

    #[tokio::test]
    async fn test_metadata_wins_over_content() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(".git").create_dir_all().unwrap();
        temp.child("f/flow.yaml").write_str("summary: x").unwrap();

        let state = inspect(temp.path()).await.unwrap();
        assert_eq!(state, WorkingDirectoryState::ExistingRepository);
    }

    #[tokio::test]
    async fn test_clear_contents_removes_everything() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("junk.txt").write_str("stale").unwrap();
        temp.child(".hidden").write_str("stale").unwrap();
        temp.child("nested/deeper/file.json").write_str("{}").unwrap();

        let removed = clear_contents(temp.path()).await.unwrap();

        assert_eq!(removed, 3);
        temp.child("junk.txt").assert(predicate::path::missing());
        temp.child("nested").assert(predicate::path::missing());
        temp.assert(predicate::path::is_dir());
        assert_eq!(
            inspect(temp.path()).await.unwrap(),
            WorkingDirectoryState::Uninitialized
        );
    }

    #[tokio::test]
    async fn test_ensure_exists_creates_nested_directory() {
        let temp = assert_fs::TempDir::new().unwrap();
        let target = temp.child("a/b/workspace");

        ensure_exists(target.path()).await.unwrap();
        target.assert(predicate::path::is_dir());
    }
}
