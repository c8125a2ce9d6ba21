//! Storage capability collaborator
//!
//! The persister and session talk to the destination through the
//! [`StorageBackend`] trait so hosts can plug in their own capability layer
//! (and tests can instrument one). [`FsStorage`] is the built-in local
//! filesystem implementation.

use crate::config::CollisionAction;
use crate::error::{Error, Result};
use crate::types::{DirectoryTarget, SaveOutcome};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Maximum number of rename attempts when resolving a destination collision
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Capability surface for delivering documents to the outside world
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Whether directory persistence is available in this runtime at all
    fn is_supported(&self) -> bool;

    /// Ask the user (or host) for a destination directory.
    ///
    /// Fails with [`Error::Storage`] when the grant is declined or cannot be
    /// established.
    async fn acquire_directory(&self) -> Result<DirectoryTarget>;

    /// Revalidate that a previously-granted target is still reachable.
    ///
    /// A stale or revoked handle fails with [`Error::TargetUnavailable`];
    /// the caller fails that persistence call, not the process.
    async fn validate_target(&self, target: &DirectoryTarget) -> Result<()>;

    /// Write one document into the target, resolving name conflicts per the
    /// collision policy. Per-file failures are reported in the outcome, never
    /// raised.
    async fn write_document(
        &self,
        target: &DirectoryTarget,
        filename: &str,
        content: &str,
        collision: CollisionAction,
    ) -> SaveOutcome;

    /// Whether archive packaging is available in this runtime
    fn archive_supported(&self) -> bool;

    /// Deliver one downloadable blob to the user
    async fn deliver_download(&self, filename: &str, bytes: &[u8]) -> SaveOutcome;
}

/// How a collision resolution turned out
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// Write to this (possibly versioned) path
    Write(PathBuf),
    /// Leave the existing file alone; the write is declined
    Decline,
}

/// Resolve a destination path against existing entries.
///
/// For [`CollisionAction::Rename`], tries `name (1).md`, `name (2).md`, ...
/// until an unused name is found.
pub(crate) fn resolve_collision(
    path: &Path,
    action: CollisionAction,
) -> std::io::Result<Resolution> {
    match action {
        CollisionAction::Overwrite => Ok(Resolution::Write(path.to_path_buf())),
        CollisionAction::Skip => {
            if path.exists() {
                Ok(Resolution::Decline)
            } else {
                Ok(Resolution::Write(path.to_path_buf()))
            }
        }
        CollisionAction::Rename => {
            if !path.exists() {
                return Ok(Resolution::Write(path.to_path_buf()));
            }

            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| std::io::Error::other("cannot extract file stem"))?;
            let extension = path.extension().and_then(|e| e.to_str());
            let parent = path
                .parent()
                .ok_or_else(|| std::io::Error::other("cannot extract parent directory"))?;

            for i in 1..=MAX_RENAME_ATTEMPTS {
                let candidate = match extension {
                    Some(ext) => format!("{} ({}).{}", stem, i, ext),
                    None => format!("{} ({})", stem, i),
                };
                let candidate = parent.join(candidate);
                if !candidate.exists() {
                    return Ok(Resolution::Write(candidate));
                }
            }

            Err(std::io::Error::other(format!(
                "could not find unique filename after {} attempts",
                MAX_RENAME_ATTEMPTS
            )))
        }
    }
}

/// Local filesystem storage backend
///
/// `root` is the directory offered when the caller asks to acquire a
/// destination; `downloads_dir` is where triggered downloads land.
#[derive(Clone, Debug)]
pub struct FsStorage {
    root: PathBuf,
    downloads_dir: PathBuf,
}

impl FsStorage {
    /// Create a backend rooted at the given directories
    pub fn new(root: impl Into<PathBuf>, downloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            downloads_dir: downloads_dir.into(),
        }
    }
}

#[async_trait]
impl StorageBackend for FsStorage {
    fn is_supported(&self) -> bool {
        true
    }

    async fn acquire_directory(&self) -> Result<DirectoryTarget> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Error::Storage(format!("failed to grant directory: {}", e)))?;
        Ok(DirectoryTarget::new(self.root.clone()))
    }

    async fn validate_target(&self, target: &DirectoryTarget) -> Result<()> {
        match tokio::fs::metadata(&target.path).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(Error::TargetUnavailable {
                name: target.name.clone(),
                reason: "destination is not a directory".to_string(),
            }),
            Err(e) => Err(Error::TargetUnavailable {
                name: target.name.clone(),
                reason: e.to_string(),
            }),
        }
    }

    async fn write_document(
        &self,
        target: &DirectoryTarget,
        filename: &str,
        content: &str,
        collision: CollisionAction,
    ) -> SaveOutcome {
        let desired = target.path.join(filename);
        let destination = match resolve_collision(&desired, collision) {
            Ok(Resolution::Write(path)) => path,
            Ok(Resolution::Decline) => {
                debug!(?desired, "write declined by collision policy");
                return SaveOutcome::Cancelled;
            }
            Err(e) => return SaveOutcome::Failed(e.to_string()),
        };

        match tokio::fs::write(&destination, content).await {
            Ok(()) => SaveOutcome::Written,
            Err(e) => {
                warn!(?destination, error = %e, "document write failed");
                SaveOutcome::Failed(e.to_string())
            }
        }
    }

    fn archive_supported(&self) -> bool {
        true
    }

    async fn deliver_download(&self, filename: &str, bytes: &[u8]) -> SaveOutcome {
        if let Err(e) = tokio::fs::create_dir_all(&self.downloads_dir).await {
            return SaveOutcome::Failed(e.to_string());
        }
        let desired = self.downloads_dir.join(filename);
        let destination = match resolve_collision(&desired, CollisionAction::Rename) {
            Ok(Resolution::Write(path)) => path,
            Ok(Resolution::Decline) => return SaveOutcome::Cancelled,
            Err(e) => return SaveOutcome::Failed(e.to_string()),
        };
        match tokio::fs::write(&destination, bytes).await {
            Ok(()) => SaveOutcome::Written,
            Err(e) => SaveOutcome::Failed(e.to_string()),
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn resolve_nonexistent_path_passes_through_for_all_actions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.md");

        for action in [
            CollisionAction::Rename,
            CollisionAction::Skip,
            CollisionAction::Overwrite,
        ] {
            assert_eq!(
                resolve_collision(&path, action).unwrap(),
                Resolution::Write(path.clone())
            );
        }
    }

    #[test]
    fn rename_appends_version_counter() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.md");
        fs::write(&path, "original").unwrap();

        let resolved = resolve_collision(&path, CollisionAction::Rename).unwrap();
        assert_eq!(resolved, Resolution::Write(dir.path().join("doc (1).md")));

        fs::write(dir.path().join("doc (1).md"), "first").unwrap();
        let resolved = resolve_collision(&path, CollisionAction::Rename).unwrap();
        assert_eq!(resolved, Resolution::Write(dir.path().join("doc (2).md")));
    }

    #[test]
    fn rename_handles_extensionless_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes");
        fs::write(&path, "x").unwrap();

        let resolved = resolve_collision(&path, CollisionAction::Rename).unwrap();
        assert_eq!(resolved, Resolution::Write(dir.path().join("notes (1)")));
    }

    #[test]
    fn skip_declines_when_file_exists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.md");
        fs::write(&path, "x").unwrap();

        assert_eq!(
            resolve_collision(&path, CollisionAction::Skip).unwrap(),
            Resolution::Decline
        );
    }

    #[test]
    fn overwrite_keeps_original_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.md");
        fs::write(&path, "x").unwrap();

        assert_eq!(
            resolve_collision(&path, CollisionAction::Overwrite).unwrap(),
            Resolution::Write(path)
        );
    }

    #[tokio::test]
    async fn acquire_and_validate_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FsStorage::new(dir.path().join("exports"), dir.path().join("downloads"));

        let target = store.acquire_directory().await.unwrap();
        assert_eq!(target.name, "exports");
        store.validate_target(&target).await.unwrap();
    }

    #[tokio::test]
    async fn stale_target_fails_validation() {
        let dir = TempDir::new().unwrap();
        let store = FsStorage::new(dir.path().join("exports"), dir.path().join("downloads"));
        let target = store.acquire_directory().await.unwrap();

        fs::remove_dir_all(&target.path).unwrap();

        let err = store.validate_target(&target).await.unwrap_err();
        assert!(matches!(err, Error::TargetUnavailable { .. }));
    }

    #[tokio::test]
    async fn write_document_versions_instead_of_overwriting() {
        let dir = TempDir::new().unwrap();
        let store = FsStorage::new(dir.path(), dir.path().join("downloads"));
        let target = store.acquire_directory().await.unwrap();

        let first = store
            .write_document(&target, "chat.md", "one", CollisionAction::Rename)
            .await;
        let second = store
            .write_document(&target, "chat.md", "two", CollisionAction::Rename)
            .await;

        assert_eq!(first, SaveOutcome::Written);
        assert_eq!(second, SaveOutcome::Written);
        assert_eq!(fs::read_to_string(target.path.join("chat.md")).unwrap(), "one");
        assert_eq!(
            fs::read_to_string(target.path.join("chat (1).md")).unwrap(),
            "two"
        );
    }

    #[tokio::test]
    async fn write_document_skip_reports_cancelled() {
        let dir = TempDir::new().unwrap();
        let store = FsStorage::new(dir.path(), dir.path().join("downloads"));
        let target = store.acquire_directory().await.unwrap();
        fs::write(target.path.join("chat.md"), "keep me").unwrap();

        let outcome = store
            .write_document(&target, "chat.md", "new", CollisionAction::Skip)
            .await;

        assert_eq!(outcome, SaveOutcome::Cancelled);
        assert_eq!(
            fs::read_to_string(target.path.join("chat.md")).unwrap(),
            "keep me"
        );
    }

    #[tokio::test]
    async fn deliver_download_lands_in_downloads_dir() {
        let dir = TempDir::new().unwrap();
        let downloads = dir.path().join("downloads");
        let store = FsStorage::new(dir.path(), &downloads);

        let outcome = store.deliver_download("bundle.zip", b"PK").await;

        assert_eq!(outcome, SaveOutcome::Written);
        assert_eq!(fs::read(downloads.join("bundle.zip")).unwrap(), b"PK");
    }
}
