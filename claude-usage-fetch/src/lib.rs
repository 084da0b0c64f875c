// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Claude Usage Fetch
//!
//! OAuth credential lifecycle and usage fetching for Claude accounts.
//!
//! ## Host APIs
//!
//! The [`host`] module provides abstractions for system interactions:
//!
//! - [`host::keychain`] - Namespaced credential storage (system keychain, in-memory)
//! - [`host::file`] - The Claude CLI's plaintext credential file
//! - [`host::http`] - HTTP client with tracing and domain allowlist
//!
//! ## OAuth
//!
//! - [`pkce`] - Verifier, challenge, and state generation
//! - [`oauth::OAuthTokenClient`] - Authorization-code and refresh exchanges
//! - [`login::InAppLogin`] - Paste-based browser login with state checking
//!
//! ## Usage
//!
//! - [`service::UsageService`] - Loads credentials, refreshes app-owned
//!   tokens near expiry, and calls the usage endpoint
//!
//! ## Example
//!
//! ```ignore
//! use claude_usage_fetch::{OAuthConfig, UsageService, UsageServiceConfig};
//!
//! let service = UsageService::with_system_stores(
//!     UsageServiceConfig::default(),
//!     OAuthConfig::default(),
//! )?;
//!
//! let usage = service.fetch_usage().await?;
//! println!("5h: {:.0}%", usage.five_hour.utilization);
//! ```

pub mod error;
pub mod host;
pub mod login;
pub mod oauth;
pub mod pkce;
pub mod service;

// Re-export key types at crate root

// Errors
pub use error::{HttpError, KeychainError, LoginError};

// Host APIs
pub use host::{
    file::CredentialsFile,
    http::HttpClient,
    keychain::{CredentialStore, MemoryKeychain, StoredEntry, SystemKeychain},
};

// OAuth & Usage
pub use login::{CallbackInput, InAppLogin, is_callback_url, parse_callback_input};
pub use oauth::{OAuthAuthorizationSession, OAuthConfig, OAuthTokenClient, RefreshedTokens};
pub use service::{CredentialStatus, UsageService, UsageServiceConfig};
