// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Claude Usage Core
//!
//! Core types and models for the Claude usage client.
//!
//! This crate provides the foundational abstractions used across all other
//! `claude-usage` crates, including:
//!
//! - Usage data returned by the OAuth usage endpoint
//! - The stored credential document and its ownership model
//! - Expiry and duration normalization
//! - The error taxonomy shared by every operation
//!
//! ## Key Types
//!
//! ### Usage Types
//! - [`UsageResponse`] - All rate-limit buckets for the account
//! - [`UsageLimit`] - A single bucket with utilization and reset time
//! - [`ExtraUsage`] - Overage credits
//! - [`UsageTier`] - Green/yellow/red severity banding
//!
//! ### Credential Types
//! - [`StoredCredentialRecord`] - The raw persisted credential document
//! - [`OAuthCredentials`] - Validated tokens extracted from a record
//! - [`CredentialOwnership`] - Whether the record may be rotated
//!
//! ### Errors
//! - [`UsageError`] - Every failure kind surfaced to callers

pub mod dates;
pub mod error;
pub mod models;

// Re-export error types
pub use error::UsageError;

// Re-export all model types
pub use models::{
    // Usage types
    ExtraUsage,
    UsageLimit,
    UsageResponse,
    UsageTier,
    // Credential types
    CredentialOwnership,
    OAuthCredentials,
    StoredCredentialRecord,
    OAUTH_KEY,
};
