//! Host APIs for the usage client.
//!
//! This module provides abstractions for interacting with external systems:
//!
//! - [`keychain`] - Secure credential storage (system keychain, in-memory)
//! - [`file`] - The Claude CLI's plaintext credential file
//! - [`http`] - HTTP client with tracing and domain allowlist

pub mod file;
pub mod http;
pub mod keychain;

// Re-export key types
pub use file::CredentialsFile;
pub use http::HttpClient;
pub use keychain::{CredentialStore, MemoryKeychain, StoredEntry, SystemKeychain};
