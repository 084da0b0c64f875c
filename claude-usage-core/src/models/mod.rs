//! Domain models for the Claude usage client.
//!
//! ## Submodules
//!
//! - [`usage`] - Usage types (`UsageResponse`, `UsageLimit`, `ExtraUsage`, `UsageTier`)
//! - [`credentials`] - Credential types (`StoredCredentialRecord`, `OAuthCredentials`)

pub mod credentials;
pub mod usage;

// Re-export everything at the models level
pub use credentials::{CredentialOwnership, OAUTH_KEY, OAuthCredentials, StoredCredentialRecord};
pub use usage::{ExtraUsage, UsageLimit, UsageResponse, UsageTier};
