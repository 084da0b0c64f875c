//! Namespaced secret storage for OAuth credential blobs.
//!
//! Every store is scoped by a service name and holds opaque byte blobs
//! keyed by account. Two logical owners share the same kind of store:
//!
//! - this app, under its own dedicated account
//! - the Claude CLI, under the OS user name (or the empty account on older
//!   versions)
//!
//! Implementations:
//! - [`SystemKeychain`] - macOS Keychain / Windows Credential Manager /
//!   Linux Secret Service via `keyring`
//! - [`MemoryKeychain`] - in-process map for tests and previews
//! - [`CredentialsFile`](super::file::CredentialsFile) - the CLI's plaintext fallback file

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use keyring::Entry;
use tracing::{debug, warn};

use crate::error::KeychainError;

/// Keychain service the Claude CLI writes to.
pub const CLAUDE_CLI_SERVICE: &str = "Claude Code-credentials";

/// Account this app stores its own credentials under.
pub const IN_APP_ACCOUNT: &str = "claude-usage-in-app-oauth";

// ============================================================================
// Stored Entry
// ============================================================================

/// A blob together with the account it was found under.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredEntry {
    /// Account identifier.
    pub account: String,
    /// Raw blob.
    pub data: Vec<u8>,
}

impl StoredEntry {
    /// Creates an entry.
    pub fn new(account: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            account: account.into(),
            data: data.into(),
        }
    }
}

impl std::fmt::Debug for StoredEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredEntry")
            .field("account", &self.account)
            .field("data", &format_args!("<{} bytes>", self.data.len()))
            .finish()
    }
}

// ============================================================================
// Credential Store Trait
// ============================================================================

/// Secret storage scoped by a service name.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Service namespace this store reads and writes.
    fn service(&self) -> &str;

    /// Reads the blob stored under `account`.
    ///
    /// # Returns
    /// * `Ok(Some(entry))` - Entry found
    /// * `Ok(None)` - No entry for this account
    /// * `Err(e)` - Error accessing the store
    async fn read(&self, account: &str) -> Result<Option<StoredEntry>, KeychainError>;

    /// Reads the first entry under the service, whatever its account.
    ///
    /// Fails with [`KeychainError::AccountMissing`] when the entry found has
    /// no usable account identifier.
    async fn read_any(&self) -> Result<Option<StoredEntry>, KeychainError>;

    /// Creates or replaces the blob under `account`.
    ///
    /// Failures surface as [`KeychainError::WriteFailed`].
    async fn write(&self, account: &str, data: &[u8]) -> Result<(), KeychainError>;

    /// Removes the entry under `account`. Absent entries are not an error.
    async fn delete(&self, account: &str) -> Result<(), KeychainError>;
}

// ============================================================================
// System Keychain Implementation
// ============================================================================

/// Credential store backed by the platform keychain.
///
/// `keyring` has no enumeration API, so [`read_any`](CredentialStore::read_any)
/// probes a fixed list of candidate accounts in order.
#[derive(Debug, Clone)]
pub struct SystemKeychain {
    service: String,
    candidate_accounts: Vec<String>,
}

impl SystemKeychain {
    /// Creates a store for the given service.
    ///
    /// The default candidates are the current OS user name and the empty
    /// account.
    pub fn new(service: impl Into<String>) -> Self {
        let mut candidate_accounts = Vec::new();
        if let Some(user) = current_user_name() {
            candidate_accounts.push(user);
        }
        candidate_accounts.push(String::new());

        Self {
            service: service.into(),
            candidate_accounts,
        }
    }

    /// Store for the Claude CLI's keychain entry.
    pub fn claude_cli() -> Self {
        Self::new(CLAUDE_CLI_SERVICE)
    }

    /// Replaces the accounts probed by `read_any`.
    #[must_use]
    pub fn with_candidate_accounts(mut self, accounts: Vec<String>) -> Self {
        self.candidate_accounts = accounts;
        self
    }

    /// Creates a keyring entry.
    fn entry(&self, account: &str) -> Result<Entry, KeychainError> {
        Entry::new(&self.service, account).map_err(|e| KeychainError::Platform(e.to_string()))
    }
}

/// Returns the OS login name, if the environment exposes one.
fn current_user_name() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|name| !name.is_empty())
}

#[async_trait]
impl CredentialStore for SystemKeychain {
    fn service(&self) -> &str {
        &self.service
    }

    async fn read(&self, account: &str) -> Result<Option<StoredEntry>, KeychainError> {
        let service = &self.service;
        debug!(service = %service, account = %account, "Reading credential from keychain");

        let entry = self.entry(account)?;

        match entry.get_secret() {
            Ok(secret) if secret.is_empty() => {
                debug!(service = %service, account = %account, "Credential empty");
                Ok(None)
            }
            Ok(secret) => {
                debug!(service = %service, account = %account, "Credential found");
                Ok(Some(StoredEntry::new(account, secret)))
            }
            Err(keyring::Error::NoEntry) => {
                debug!(service = %service, account = %account, "Credential not found");
                Ok(None)
            }
            Err(e) => {
                warn!(service = %service, account = %account, error = %e, "Failed to read credential");
                Err(e.into())
            }
        }
    }

    async fn read_any(&self) -> Result<Option<StoredEntry>, KeychainError> {
        for account in &self.candidate_accounts {
            match self.read(account).await {
                Ok(Some(entry)) if entry.account.is_empty() => {
                    warn!(service = %self.service, "Credential found without account metadata");
                    return Err(KeychainError::AccountMissing {
                        service: self.service.clone(),
                    });
                }
                Ok(Some(entry)) => return Ok(Some(entry)),
                Ok(None) => {}
                // Some backends reject the empty account outright
                Err(e) => {
                    debug!(service = %self.service, account = %account, error = %e, "Skipping candidate account");
                }
            }
        }
        Ok(None)
    }

    async fn write(&self, account: &str, data: &[u8]) -> Result<(), KeychainError> {
        let service = &self.service;
        debug!(service = %service, account = %account, bytes = data.len(), "Writing credential to keychain");

        let entry = self
            .entry(account)
            .map_err(|e| KeychainError::WriteFailed(e.to_string()))?;

        // keyring updates an existing item in place and creates it otherwise.
        entry.set_secret(data).map_err(|e| {
            warn!(service = %service, account = %account, error = %e, "Failed to write credential");
            KeychainError::WriteFailed(e.to_string())
        })?;

        debug!(service = %service, account = %account, "Credential stored successfully");
        Ok(())
    }

    async fn delete(&self, account: &str) -> Result<(), KeychainError> {
        let service = &self.service;
        debug!(service = %service, account = %account, "Deleting credential from keychain");

        let entry = self.entry(account)?;

        match entry.delete_credential() {
            Ok(()) => {
                debug!(service = %service, account = %account, "Credential deleted");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => {
                debug!(service = %service, account = %account, "Credential not found (already deleted)");
                Ok(())
            }
            Err(e) => {
                warn!(service = %service, account = %account, error = %e, "Failed to delete credential");
                Err(e.into())
            }
        }
    }
}

// ============================================================================
// In-Memory Implementation
// ============================================================================

/// Credential store held in process memory.
#[derive(Debug, Default)]
pub struct MemoryKeychain {
    service: String,
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
    write_count: AtomicUsize,
}

impl MemoryKeychain {
    /// Creates an empty store.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    /// Creates a store holding one entry.
    pub fn with_entry(service: impl Into<String>, account: &str, data: impl Into<Vec<u8>>) -> Self {
        let store = Self::new(service);
        if let Ok(mut entries) = store.entries.lock() {
            entries.insert(account.to_string(), data.into());
        }
        store
    }

    /// Makes every subsequent write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    /// Returns a copy of the blob under `account`.
    pub fn get(&self, account: &str) -> Option<Vec<u8>> {
        self.entries.lock().ok()?.get(account).cloned()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>, KeychainError> {
        self.entries
            .lock()
            .map_err(|_| KeychainError::Other("memory keychain lock poisoned".to_string()))
    }
}

#[async_trait]
impl CredentialStore for MemoryKeychain {
    fn service(&self) -> &str {
        &self.service
    }

    async fn read(&self, account: &str) -> Result<Option<StoredEntry>, KeychainError> {
        let entries = self.lock()?;
        Ok(entries
            .get(account)
            .map(|data| StoredEntry::new(account, data.clone())))
    }

    async fn read_any(&self) -> Result<Option<StoredEntry>, KeychainError> {
        let entries = self.lock()?;
        match entries.iter().next() {
            Some((account, _)) if account.is_empty() => Err(KeychainError::AccountMissing {
                service: self.service.clone(),
            }),
            Some((account, data)) => Ok(Some(StoredEntry::new(account.clone(), data.clone()))),
            None => Ok(None),
        }
    }

    async fn write(&self, account: &str, data: &[u8]) -> Result<(), KeychainError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(KeychainError::WriteFailed("write rejected".to_string()));
        }
        let mut entries = self
            .lock()
            .map_err(|e| KeychainError::WriteFailed(e.to_string()))?;
        entries.insert(account.to_string(), data.to_vec());
        self.write_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, account: &str) -> Result<(), KeychainError> {
        self.lock()?.remove(account);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
