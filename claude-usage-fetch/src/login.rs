//! In-app browser login.
//!
//! The flow is paste-based: the user opens the authorize URL, signs in, and
//! pastes back whatever the provider shows them. [`InAppLogin`] holds the
//! single session in flight and enforces the CSRF state check before any
//! network call is made.

use tracing::{debug, warn};
use url::Url;

use crate::error::LoginError;
use crate::oauth::OAuthAuthorizationSession;
use crate::service::UsageService;

// ============================================================================
// Callback Input
// ============================================================================

/// Code and state extracted from pasted callback input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackInput {
    /// Authorization code. Empty if none was found.
    pub code: String,
    /// Returned state. Empty if the input carried none.
    pub state: String,
}

/// Parses what a user pastes after signing in.
///
/// Accepts a full callback URL (`?code=...&state=...`), the provider's
/// `code#state` display form, or a bare code.
pub fn parse_callback_input(raw: &str) -> CallbackInput {
    let trimmed = raw.trim();

    if let Some(url) = web_url(trimmed) {
        let mut input = CallbackInput::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" if input.code.is_empty() => input.code = value.trim().to_string(),
                "state" if input.state.is_empty() => input.state = value.trim().to_string(),
                _ => {}
            }
        }
        return input;
    }

    match trimmed.split_once('#') {
        Some((code, state)) => CallbackInput {
            code: code.trim().to_string(),
            state: state.trim().to_string(),
        },
        None => CallbackInput {
            code: trimmed.to_string(),
            state: String::new(),
        },
    }
}

fn web_url(raw: &str) -> Option<Url> {
    Url::parse(raw)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

/// Returns true if `url` points at the registered redirect URI.
///
/// Scheme and host compare case-insensitively; the path must match exactly.
pub fn is_callback_url(url: &str, redirect_uri: &str) -> bool {
    let (Ok(url), Ok(redirect)) = (Url::parse(url.trim()), Url::parse(redirect_uri)) else {
        return false;
    };

    url.scheme().eq_ignore_ascii_case(redirect.scheme())
        && match (url.host_str(), redirect.host_str()) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
        && url.port_or_known_default() == redirect.port_or_known_default()
        && url.path() == redirect.path()
}

// ============================================================================
// Login Coordinator
// ============================================================================

/// Holds at most one in-flight authorization session.
#[derive(Debug, Default)]
pub struct InAppLogin {
    session: Option<OAuthAuthorizationSession>,
}

impl InAppLogin {
    /// Creates a coordinator with no session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new session, replacing any previous one.
    pub fn begin(&mut self, service: &UsageService) -> &OAuthAuthorizationSession {
        if self.session.is_some() {
            debug!("Replacing in-flight OAuth session");
        }
        self.session
            .insert(service.create_oauth_authorization_session())
    }

    /// Discards the session, if any.
    pub fn cancel(&mut self) {
        if self.session.take().is_some() {
            debug!("OAuth session cancelled");
        }
    }

    /// Returns the session in flight.
    pub fn session(&self) -> Option<&OAuthAuthorizationSession> {
        self.session.as_ref()
    }

    /// Returns true while a session is in flight.
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Completes the session with a pasted code and returned state.
    ///
    /// The session is discarded whatever the outcome.
    ///
    /// # Errors
    ///
    /// - [`LoginError::NoActiveSession`] - nothing to complete
    /// - [`LoginError::StateMismatch`] - a non-empty `returned_state` differs
    ///   from the session's; no exchange is attempted
    /// - [`LoginError::Service`] - the exchange or the write failed
    pub async fn complete(
        &mut self,
        service: &UsageService,
        code: &str,
        returned_state: &str,
    ) -> Result<(), LoginError> {
        let session = self.session.take().ok_or(LoginError::NoActiveSession)?;

        let returned_state = returned_state.trim();
        if !session.accepts_state(returned_state) {
            warn!("OAuth state mismatch, discarding session");
            return Err(LoginError::StateMismatch);
        }

        service
            .complete_oauth_authorization(code, &session.state, &session.code_verifier)
            .await?;
        Ok(())
    }

    /// Parses pasted callback input and completes the session with it.
    ///
    /// A pasted URL must point at the configured redirect URI. Any other URL
    /// is rejected and the session stays in flight so the user can paste again.
    ///
    /// # Errors
    ///
    /// [`LoginError::UnexpectedCallback`] for a URL on the wrong host or path,
    /// otherwise the same as [`complete`](Self::complete).
    pub async fn complete_with_input(
        &mut self,
        service: &UsageService,
        raw_input: &str,
    ) -> Result<(), LoginError> {
        let trimmed = raw_input.trim();
        if web_url(trimmed).is_some()
            && !is_callback_url(trimmed, &service.oauth_config().redirect_uri)
        {
            warn!("Pasted URL is not the sign-in callback");
            return Err(LoginError::UnexpectedCallback);
        }

        let input = parse_callback_input(trimmed);
        self.complete(service, &input.code, &input.state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::DEFAULT_REDIRECT_URI;

    #[test]
    fn test_parse_callback_url() {
        let input = parse_callback_input(
            "  https://platform.claude.com/oauth/code/callback?code=abc123&state=xyz  \n",
        );
        assert_eq!(input.code, "abc123");
        assert_eq!(input.state, "xyz");
    }

    #[test]
    fn test_parse_code_hash_state() {
        let input = parse_callback_input("abc123#xyz");
        assert_eq!(
            input,
            CallbackInput {
                code: "abc123".into(),
                state: "xyz".into()
            }
        );
    }

    #[test]
    fn test_parse_bare_code() {
        let input = parse_callback_input(" abc123 ");
        assert_eq!(input.code, "abc123");
        assert!(input.state.is_empty());
    }

    #[test]
    fn test_parse_empty_input() {
        assert_eq!(parse_callback_input("   "), CallbackInput::default());
    }

    #[test]
    fn test_is_callback_url() {
        assert!(is_callback_url(
            "https://platform.claude.com/oauth/code/callback?code=a&state=b",
            DEFAULT_REDIRECT_URI
        ));
        assert!(is_callback_url(
            "HTTPS://Platform.Claude.com/oauth/code/callback",
            DEFAULT_REDIRECT_URI
        ));
        assert!(!is_callback_url(
            "https://platform.claude.com/oauth/other",
            DEFAULT_REDIRECT_URI
        ));
        assert!(!is_callback_url(
            "https://evil.example/oauth/code/callback",
            DEFAULT_REDIRECT_URI
        ));
        assert!(!is_callback_url("abc123#xyz", DEFAULT_REDIRECT_URI));
    }

    #[test]
    fn test_cancel_discards_session() {
        let mut login = InAppLogin::new();
        assert!(!login.is_active());
        login.cancel();
        assert!(login.session().is_none());
    }
}
