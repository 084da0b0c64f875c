//! Fetch error types.
//!
//! Store and transport failures are kept as their own types so the host
//! layer can log them with full detail. Each one collapses into exactly one
//! [`UsageError`] kind before it reaches a caller.

use claude_usage_core::UsageError;
use thiserror::Error;

// ============================================================================
// HTTP Error
// ============================================================================

/// HTTP-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request error.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Domain not allowed.
    #[error("Domain not allowed: {0}")]
    DomainNotAllowed(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Timeout.
    #[error("Request timed out")]
    Timeout,
}

impl HttpError {
    /// Classifies a reqwest error, splitting out timeouts.
    pub fn from_request(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(err)
        }
    }
}

impl From<HttpError> for UsageError {
    fn from(err: HttpError) -> Self {
        UsageError::Network(err.to_string())
    }
}

// ============================================================================
// Keychain Error
// ============================================================================

/// Error type for credential store operations.
#[derive(Debug, Error)]
pub enum KeychainError {
    /// An entry exists but has no usable account identifier.
    #[error("Credential under {service} has no account identifier")]
    AccountMissing {
        /// Service name.
        service: String,
    },

    /// Update and create both failed.
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// Access denied.
    #[error("Access denied to keychain")]
    AccessDenied,

    /// Platform error.
    #[error("Platform error: {0}")]
    Platform(String),

    /// IO error from a file-backed store.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error.
    #[error("Keychain error: {0}")]
    Other(String),
}

impl From<keyring::Error> for KeychainError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::NoEntry => KeychainError::Other("No credential entry".to_string()),
            keyring::Error::Ambiguous(_) => {
                KeychainError::Other("Ambiguous credential entry".to_string())
            }
            keyring::Error::PlatformFailure(e) => KeychainError::Platform(e.to_string()),
            keyring::Error::NoStorageAccess(_) => KeychainError::AccessDenied,
            _ => KeychainError::Other(err.to_string()),
        }
    }
}

impl From<KeychainError> for UsageError {
    /// Read-side failures of any kind mean "no usable record".
    fn from(err: KeychainError) -> Self {
        match err {
            KeychainError::AccountMissing { .. } => UsageError::KeychainAccountMissing,
            KeychainError::WriteFailed(cause) => UsageError::KeychainWriteFailed(cause),
            KeychainError::AccessDenied
            | KeychainError::Platform(_)
            | KeychainError::Io(_)
            | KeychainError::Other(_) => UsageError::KeychainNotFound,
        }
    }
}

// ============================================================================
// Login Error
// ============================================================================

/// Error type for the in-app login flow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginError {
    /// `complete` was called with no session in progress.
    #[error("OAuth session expired. Start sign-in again")]
    NoActiveSession,

    /// The callback's state did not match the session.
    #[error("OAuth state mismatch. Start sign-in again")]
    StateMismatch,

    /// A pasted URL was not the registered redirect URI.
    #[error("That URL is not the sign-in callback. Paste the code shown after signing in")]
    UnexpectedCallback,

    /// The exchange itself failed.
    #[error(transparent)]
    Service(#[from] UsageError),
}

impl LoginError {
    /// Returns true if starting a fresh login can fix this error.
    pub fn supports_login_recovery(&self) -> bool {
        match self {
            Self::NoActiveSession | Self::StateMismatch | Self::UnexpectedCallback => true,
            Self::Service(err) => err.supports_login_recovery(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keychain_error_mapping() {
        assert_eq!(
            UsageError::from(KeychainError::Other("gone".into())),
            UsageError::KeychainNotFound
        );
        assert_eq!(
            UsageError::from(KeychainError::AccountMissing {
                service: "svc".into()
            }),
            UsageError::KeychainAccountMissing
        );
        assert_eq!(
            UsageError::from(KeychainError::WriteFailed("locked".into())),
            UsageError::KeychainWriteFailed("locked".into())
        );
        assert_eq!(
            UsageError::from(KeychainError::AccessDenied),
            UsageError::KeychainNotFound
        );
    }

    #[test]
    fn test_keyring_no_entry_reads_as_absent() {
        let err = KeychainError::from(keyring::Error::NoEntry);
        assert!(matches!(err, KeychainError::Other(_)));
        assert_eq!(UsageError::from(err), UsageError::KeychainNotFound);
    }

    #[test]
    fn test_http_error_is_network() {
        let err = UsageError::from(HttpError::Timeout);
        assert!(matches!(err, UsageError::Network(_)));
        assert!(!err.supports_login_recovery());
    }

    #[test]
    fn test_login_error_recovery() {
        assert!(LoginError::StateMismatch.supports_login_recovery());
        assert!(LoginError::UnexpectedCallback.supports_login_recovery());
        assert!(LoginError::from(UsageError::http(401, None)).supports_login_recovery());
        assert!(!LoginError::from(UsageError::Network("reset".into())).supports_login_recovery());
    }
}
