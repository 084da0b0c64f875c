//! The Claude CLI's plaintext credential file.
//!
//! On systems without a usable keychain the CLI writes the same JSON blob
//! to `~/.claude/.credentials.json`. This module exposes that file as a
//! single-account [`CredentialStore`] whose account id is the file name.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::keychain::{CredentialStore, StoredEntry};
use crate::error::KeychainError;

/// Account id reported for entries read from the file.
pub const CREDENTIALS_FILE_ACCOUNT: &str = ".credentials.json";

/// Returns `~/.claude/.credentials.json`.
pub fn default_credentials_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".claude").join(CREDENTIALS_FILE_ACCOUNT))
}

/// File-backed credential store.
#[derive(Debug, Clone)]
pub struct CredentialsFile {
    path: PathBuf,
    service: String,
}

impl CredentialsFile {
    /// Creates a store over the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let service = path.display().to_string();
        Self { path, service }
    }

    /// Store over the CLI's default credential file, if a home directory exists.
    pub fn claude_cli() -> Option<Self> {
        default_credentials_path().map(Self::new)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_atomic(&self, data: &[u8]) -> Result<(), KeychainError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let result = write_then_rename(&temp_path, &self.path, data).await;
        if result.is_err() {
            if let Err(e) = tokio::fs::remove_file(&temp_path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %temp_path.display(), error = %e, "Failed to remove temp file");
                }
            }
        }
        result
    }
}

/// Writes `data` to `temp_path`, owner-only from creation, then renames it over `path`.
async fn write_then_rename(temp_path: &Path, path: &Path, data: &[u8]) -> Result<(), KeychainError> {
    use tokio::io::AsyncWriteExt;

    // A stale temp file keeps its old mode on open, so start fresh.
    match tokio::fs::remove_file(temp_path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(temp_path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(temp_path, path).await?;
    Ok(())
}

#[async_trait]
impl CredentialStore for CredentialsFile {
    fn service(&self) -> &str {
        &self.service
    }

    async fn read(&self, account: &str) -> Result<Option<StoredEntry>, KeychainError> {
        if account != CREDENTIALS_FILE_ACCOUNT {
            return Ok(None);
        }

        debug!(path = %self.path.display(), "Reading credentials file");

        match tokio::fs::read(&self.path).await {
            Ok(data) if data.is_empty() => Ok(None),
            Ok(data) => Ok(Some(StoredEntry::new(CREDENTIALS_FILE_ACCOUNT, data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Credentials file not found");
                Ok(None)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read credentials file");
                Err(e.into())
            }
        }
    }

    async fn read_any(&self) -> Result<Option<StoredEntry>, KeychainError> {
        self.read(CREDENTIALS_FILE_ACCOUNT).await
    }

    async fn write(&self, account: &str, data: &[u8]) -> Result<(), KeychainError> {
        if account != CREDENTIALS_FILE_ACCOUNT {
            return Err(KeychainError::WriteFailed(format!(
                "{} holds a single account",
                self.path.display()
            )));
        }

        debug!(path = %self.path.display(), bytes = data.len(), "Writing credentials file");

        self.write_atomic(data).await.map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "Failed to write credentials file");
            KeychainError::WriteFailed(e.to_string())
        })
    }

    async fn delete(&self, account: &str) -> Result<(), KeychainError> {
        if account != CREDENTIALS_FILE_ACCOUNT {
            return Ok(());
        }

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Credentials file deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialsFile::new(dir.path().join(".credentials.json"));
        assert!(store.read_any().await.unwrap().is_none());
        store.delete(CREDENTIALS_FILE_ACCOUNT).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialsFile::new(dir.path().join("nested").join(".credentials.json"));

        store
            .write(CREDENTIALS_FILE_ACCOUNT, br#"{"claudeAiOauth":{}}"#)
            .await
            .unwrap();

        let entry = store.read_any().await.unwrap().unwrap();
        assert_eq!(entry.account, CREDENTIALS_FILE_ACCOUNT);
        assert_eq!(entry.data, br#"{"claudeAiOauth":{}}"#);

        // Temp file is gone after the rename
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_other_accounts_are_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialsFile::new(dir.path().join(".credentials.json"));
        store.write(CREDENTIALS_FILE_ACCOUNT, b"{}").await.unwrap();

        assert!(store.read("someone").await.unwrap().is_none());
        assert!(matches!(
            store.write("someone", b"{}").await,
            Err(KeychainError::WriteFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_write_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialsFile::new(dir.path().join(".credentials.json"));

        // A non-empty directory at the target makes the rename fail.
        std::fs::create_dir(store.path()).unwrap();
        std::fs::write(store.path().join("keep"), b"x").unwrap();

        let result = store.write(CREDENTIALS_FILE_ACCOUNT, b"{}").await;
        assert!(matches!(result, Err(KeychainError::WriteFailed(_))));
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stale_temp_file_does_not_leak_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = CredentialsFile::new(dir.path().join(".credentials.json"));
        let temp_path = store.path().with_extension("json.tmp");
        std::fs::write(&temp_path, b"stale").unwrap();
        std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o644)).unwrap();

        store.write(CREDENTIALS_FILE_ACCOUNT, b"{}").await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert_eq!(std::fs::read(store.path()).unwrap(), b"{}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_written_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = CredentialsFile::new(dir.path().join(".credentials.json"));
        store.write(CREDENTIALS_FILE_ACCOUNT, b"{}").await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "Credentials file should have 0600 permissions");
    }
}
