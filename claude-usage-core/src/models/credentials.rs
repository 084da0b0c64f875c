//! OAuth credential types.
//!
//! The credential store holds a JSON document shared with the Claude CLI:
//!
//! ```json
//! {
//!   "claudeAiOauth": {
//!     "accessToken": "...",
//!     "refreshToken": "...",
//!     "expiresAt": 1735000000000,
//!     "scopes": ["user:profile"]
//!   },
//!   "mcpOAuth": { "...": "..." }
//! }
//! ```
//!
//! Only the three token fields under `claudeAiOauth` are ever touched.
//! Everything else, including sibling fields inside `claudeAiOauth`, is
//! carried through read-modify-write cycles verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dates::parse_expiry_date;
use crate::error::UsageError;

/// Top-level key of the OAuth sub-object.
pub const OAUTH_KEY: &str = "claudeAiOauth";
/// Access token field inside the OAuth sub-object.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";
/// Refresh token field inside the OAuth sub-object.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
/// Expiry field inside the OAuth sub-object.
pub const EXPIRES_AT_KEY: &str = "expiresAt";

// ============================================================================
// OAuth Credentials
// ============================================================================

/// Validated credentials for one operation.
///
/// Rebuilt from the store on every fetch; never cached.
#[derive(Clone, PartialEq)]
pub struct OAuthCredentials {
    /// Bearer token for API calls.
    pub access_token: String,
    /// Token used to obtain a new access token.
    pub refresh_token: String,
    /// When the access token expires.
    pub expires_at: DateTime<Utc>,
}

impl OAuthCredentials {
    /// Returns true if the token expires within `skew` of `now`.
    pub fn expires_within(&self, skew: chrono::Duration, now: DateTime<Utc>) -> bool {
        self.expires_at - now <= skew
    }
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

// ============================================================================
// Ownership
// ============================================================================

/// Which logical owner a stored record belongs to.
///
/// Only [`OwnedByApp`](Self::OwnedByApp) records may have their refresh token
/// rotated. A foreign record's access token is used as-is even past expiry;
/// the API's 401 then drives an in-app login instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialOwnership {
    /// Stored under this app's own account.
    OwnedByApp,
    /// Written by the companion CLI. Read-only.
    ForeignReadOnly,
}

impl CredentialOwnership {
    /// Returns true if this owner may rotate the refresh token.
    pub fn may_rotate(self) -> bool {
        matches!(self, Self::OwnedByApp)
    }
}

impl std::fmt::Display for CredentialOwnership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OwnedByApp => write!(f, "in-app"),
            Self::ForeignReadOnly => write!(f, "claude-cli (read-only)"),
        }
    }
}

// ============================================================================
// Stored Record
// ============================================================================

/// The raw persisted credential document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredCredentialRecord {
    root: Map<String, Value>,
}

impl StoredCredentialRecord {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a stored blob.
    ///
    /// Anything that isn't a JSON object has no OAuth sub-object, so it
    /// fails with [`UsageError::TokenMissing`].
    pub fn from_slice(data: &[u8]) -> Result<Self, UsageError> {
        match serde_json::from_slice::<Value>(data) {
            Ok(Value::Object(root)) => Ok(Self { root }),
            _ => Err(UsageError::TokenMissing),
        }
    }

    /// Parses a stored blob, falling back to an empty record.
    ///
    /// Used when preparing a write: an unreadable record is replaced.
    pub fn from_slice_or_empty(data: &[u8]) -> Self {
        Self::from_slice(data).unwrap_or_default()
    }

    /// Serializes the record for storage.
    pub fn to_vec(&self) -> Vec<u8> {
        // Serializing a Map<String, Value> cannot fail.
        serde_json::to_vec(&self.root).unwrap_or_default()
    }

    /// Returns the top-level document.
    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    /// Returns the OAuth sub-object, if present.
    pub fn oauth(&self) -> Option<&Map<String, Value>> {
        self.root.get(OAUTH_KEY).and_then(Value::as_object)
    }

    /// Extracts and validates the OAuth credentials.
    ///
    /// # Errors
    ///
    /// - [`UsageError::TokenMissing`] - no OAuth sub-object or access token
    /// - [`UsageError::RefreshTokenMissing`] - no refresh token
    /// - [`UsageError::TokenExpiryMissing`] - no expiry field
    /// - [`UsageError::TokenExpiryInvalid`] - expiry present but unparseable
    pub fn credentials(&self) -> Result<OAuthCredentials, UsageError> {
        let oauth = self.oauth().ok_or(UsageError::TokenMissing)?;

        let access_token = oauth
            .get(ACCESS_TOKEN_KEY)
            .and_then(Value::as_str)
            .ok_or(UsageError::TokenMissing)?;

        let refresh_token = oauth
            .get(REFRESH_TOKEN_KEY)
            .and_then(Value::as_str)
            .ok_or(UsageError::RefreshTokenMissing)?;

        let raw_expires_at = oauth
            .get(EXPIRES_AT_KEY)
            .filter(|value| !value.is_null())
            .ok_or(UsageError::TokenExpiryMissing)?;

        let expires_at = parse_expiry_date(raw_expires_at).ok_or(UsageError::TokenExpiryInvalid)?;

        Ok(OAuthCredentials {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_at,
        })
    }

    /// Merges new tokens into the OAuth sub-object.
    ///
    /// Only the three token fields change. Other top-level keys and other
    /// fields inside the OAuth sub-object are preserved. A non-object value
    /// under the OAuth key is replaced.
    pub fn merge_tokens(&mut self, access_token: &str, refresh_token: &str, expires_at: Value) {
        let oauth = self
            .root
            .entry(OAUTH_KEY)
            .or_insert_with(|| Value::Object(Map::new()));

        if !oauth.is_object() {
            *oauth = Value::Object(Map::new());
        }

        if let Value::Object(fields) = oauth {
            fields.insert(ACCESS_TOKEN_KEY.to_string(), Value::from(access_token));
            fields.insert(REFRESH_TOKEN_KEY.to_string(), Value::from(refresh_token));
            fields.insert(EXPIRES_AT_KEY.to_string(), expires_at);
        }
    }
}

impl From<Map<String, Value>> for StoredCredentialRecord {
    fn from(root: Map<String, Value>) -> Self {
        Self { root }
    }
}

// ============================================================================
// Tests
// ============================================================================
