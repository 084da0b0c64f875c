//! Error taxonomy for credential and usage operations.

use thiserror::Error;

/// Errors surfaced by credential loading, token exchange, and usage fetching.
///
/// Every failure inside the client maps to exactly one of these kinds. None
/// of them are retried internally; the caller's refresh timer is the retry
/// mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    /// No credential record present in any store.
    #[error("Claude Code credentials not found in Keychain")]
    KeychainNotFound,

    /// A record exists but carries no usable account identifier.
    #[error("Keychain credential is missing account metadata")]
    KeychainAccountMissing,

    /// The OAuth sub-object or its access token is missing.
    #[error("OAuth access token missing from credentials")]
    TokenMissing,

    /// The OAuth sub-object has no refresh token.
    #[error("OAuth refresh token missing from credentials")]
    RefreshTokenMissing,

    /// No expiry value was provided.
    #[error("OAuth token expiry missing from credentials")]
    TokenExpiryMissing,

    /// An expiry value was provided but could not be parsed.
    #[error("OAuth token expiry is invalid")]
    TokenExpiryInvalid,

    /// An empty authorization code was submitted.
    #[error("OAuth authorization code missing from callback")]
    OAuthCodeMissing,

    /// Writing the credential record failed.
    #[error("Failed to update OAuth credentials in Keychain ({0})")]
    KeychainWriteFailed(String),

    /// Transport-level failure (DNS, TLS, timeout, connection reset).
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response from the identity provider or usage API.
    #[error("{}", http_error_description(.status, .message))]
    Http {
        /// HTTP status code.
        status: u16,
        /// Best-effort message extracted from the response body.
        message: Option<String>,
    },

    /// The response body could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decoding(String),
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn http_error_description(status: &u16, message: &Option<String>) -> String {
    match (*status, message.as_deref()) {
        (401, _) => "Token expired. Sign in again (or run `claude auth login`)".to_string(),
        (403, None) => "Access denied (HTTP 403)".to_string(),
        (_, Some(message)) => message.to_string(),
        (_, None) => format!("API returned HTTP {status}"),
    }
}

impl UsageError {
    /// Creates an HTTP error from a status code and optional message.
    pub fn http(status: u16, message: Option<String>) -> Self {
        Self::Http { status, message }
    }

    /// Returns true if signing in again can fix this error.
    ///
    /// HTTP errors only qualify when the API rejected the token (401).
    pub fn supports_login_recovery(&self) -> bool {
        match self {
            Self::KeychainNotFound
            | Self::KeychainAccountMissing
            | Self::TokenMissing
            | Self::RefreshTokenMissing
            | Self::TokenExpiryMissing
            | Self::TokenExpiryInvalid
            | Self::OAuthCodeMissing => true,
            Self::Http { status, .. } => *status == 401,
            Self::KeychainWriteFailed(_) | Self::Network(_) | Self::Decoding(_) => false,
        }
    }

    /// Returns true if the server rejected the bearer token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Http { status: 401, .. })
    }
}
