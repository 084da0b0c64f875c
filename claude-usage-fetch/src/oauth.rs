//! OAuth authorization-code and refresh-token exchanges.
//!
//! # Token Endpoint
//!
//! ```text
//! POST https://platform.claude.com/v1/oauth/token
//! Content-Type: application/json
//! ```
//!
//! Both grants are single-shot: one request, one terminal outcome, no
//! internal retry.
//!
//! # Response Format
//!
//! ```json
//! {
//!   "access_token": "...",
//!   "refresh_token": "...",
//!   "expires_in": 28800
//! }
//! ```
//!
//! Either snake_case or camelCase keys are accepted, and an absolute
//! `expires_at` takes precedence over a relative `expires_in`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use claude_usage_core::UsageError;
use claude_usage_core::dates::{parse_expiry_date, parse_time_interval};
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};

use crate::host::HttpClient;
use crate::pkce::PkceTriple;

// ============================================================================
// Constants
// ============================================================================

/// OAuth client id of the Claude CLI.
pub const DEFAULT_CLIENT_ID: &str = "9d1c250a-e61b-44d9-88ed-5944d1962f5e";

/// Browser authorize endpoint.
pub const DEFAULT_AUTHORIZE_URL: &str = "https://claude.ai/oauth/authorize";

/// Token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://platform.claude.com/v1/oauth/token";

/// Redirect URI registered for the client id.
pub const DEFAULT_REDIRECT_URI: &str = "https://platform.claude.com/oauth/code/callback";

/// Scopes requested at authorization time.
pub const DEFAULT_AUTHORIZE_SCOPES: &[&str] = &["user:profile"];

/// Scopes requested on refresh.
pub const DEFAULT_REFRESH_SCOPES: &[&str] = &[
    "user:profile",
    "user:inference",
    "user:sessions:claude_code",
    "user:mcp_servers",
];

/// Timeout for the authorization-code exchange.
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(20);

/// Timeout for the refresh-token exchange.
pub const REFRESH_TIMEOUT: Duration = Duration::from_secs(15);

// ============================================================================
// Configuration
// ============================================================================

/// Identity-provider settings.
///
/// The client id and scope sets are borrowed from the Claude CLI; they are
/// configuration rather than constants so a dedicated client can replace them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    /// OAuth client id.
    pub client_id: String,
    /// Browser authorize endpoint.
    pub authorize_url: String,
    /// Token endpoint.
    pub token_url: String,
    /// Redirect URI sent with both the authorize request and the code exchange.
    pub redirect_uri: String,
    /// Scopes requested at authorization time.
    pub authorize_scopes: Vec<String>,
    /// Scopes requested on refresh.
    pub refresh_scopes: Vec<String>,
    /// Timeout for the code exchange.
    pub exchange_timeout: Duration,
    /// Timeout for refresh.
    pub refresh_timeout: Duration,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            authorize_scopes: DEFAULT_AUTHORIZE_SCOPES.iter().map(ToString::to_string).collect(),
            refresh_scopes: DEFAULT_REFRESH_SCOPES.iter().map(ToString::to_string).collect(),
            exchange_timeout: EXCHANGE_TIMEOUT,
            refresh_timeout: REFRESH_TIMEOUT,
        }
    }
}

impl OAuthConfig {
    /// Builds the browser authorize URL for a PKCE challenge and state.
    ///
    /// Query parameter order is fixed.
    pub fn authorization_url(&self, code_challenge: &str, state: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("code", "true")
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &self.authorize_scopes.join(" "))
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("state", state)
            .finish();

        let separator = if self.authorize_url.contains('?') { '&' } else { '?' };
        format!("{}{separator}{query}", self.authorize_url)
    }
}

// ============================================================================
// Authorization Session
// ============================================================================

/// One in-flight browser login.
///
/// Held in memory only and discarded on completion, cancellation, or failure.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthAuthorizationSession {
    /// URL to open in the browser.
    pub authorization_url: String,
    /// CSRF state the callback must echo.
    pub state: String,
    /// PKCE verifier for the code exchange.
    pub code_verifier: String,
}

impl OAuthAuthorizationSession {
    /// Creates a session with fresh PKCE material.
    pub fn new(config: &OAuthConfig) -> Self {
        let pkce = PkceTriple::generate();
        Self {
            authorization_url: config.authorization_url(&pkce.code_challenge, &pkce.state),
            state: pkce.state,
            code_verifier: pkce.code_verifier,
        }
    }

    /// Returns true if a state echoed by the callback is acceptable.
    ///
    /// An empty returned state is accepted; some paste flows drop it.
    pub fn accepts_state(&self, returned_state: &str) -> bool {
        returned_state.is_empty() || returned_state == self.state
    }
}

impl std::fmt::Debug for OAuthAuthorizationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthAuthorizationSession")
            .field("authorization_url", &self.authorization_url)
            .field("state", &self.state)
            .field("code_verifier", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// Token Response
// ============================================================================

/// Tokens returned by a successful exchange.
#[derive(Clone, PartialEq)]
pub struct RefreshedTokens {
    /// New access token.
    pub access_token: String,
    /// New (possibly rotated) refresh token.
    pub refresh_token: String,
    /// When the access token expires.
    pub expires_at: DateTime<Utc>,
    /// Value to persist under `expiresAt`.
    ///
    /// The provider's raw `expires_at` when it sent one, otherwise integer
    /// unix seconds computed from `expires_in`.
    pub expires_at_storage: Value,
}

impl std::fmt::Debug for RefreshedTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshedTokens")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Returns the first of `keys` present as a string.
fn string_field<'a>(json: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| json.get(*key).and_then(Value::as_str))
}

/// Returns the first of `keys` present and non-null.
fn raw_field<'a>(json: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| json.get(*key).filter(|value| !value.is_null()))
}

/// Parses a token endpoint success body.
///
/// # Errors
///
/// - [`UsageError::Decoding`] - body is not a JSON object
/// - [`UsageError::TokenMissing`] - no non-empty access token
/// - [`UsageError::RefreshTokenMissing`] - no non-empty refresh token
/// - [`UsageError::TokenExpiryInvalid`] - `expires_at` present but unparseable
/// - [`UsageError::TokenExpiryMissing`] - no usable `expires_at` or `expires_in`
pub fn parse_token_response(body: &[u8], now: DateTime<Utc>) -> Result<RefreshedTokens, UsageError> {
    let json = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            return Err(UsageError::Decoding(
                "OAuth token response was not a JSON object".to_string(),
            ));
        }
        Err(e) => return Err(UsageError::Decoding(e.to_string())),
    };

    let access_token = string_field(&json, &["access_token", "accessToken"])
        .filter(|token| !token.is_empty())
        .ok_or(UsageError::TokenMissing)?;

    let refresh_token = string_field(&json, &["refresh_token", "refreshToken"])
        .filter(|token| !token.is_empty())
        .ok_or(UsageError::RefreshTokenMissing)?;

    if let Some(raw_expires_at) = raw_field(&json, &["expires_at", "expiresAt"]) {
        let expires_at = parse_expiry_date(raw_expires_at).ok_or(UsageError::TokenExpiryInvalid)?;
        return Ok(RefreshedTokens {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_at,
            expires_at_storage: raw_expires_at.clone(),
        });
    }

    let expires_in = raw_field(&json, &["expires_in", "expiresIn"])
        .and_then(parse_time_interval)
        .ok_or(UsageError::TokenExpiryMissing)?;

    #[allow(clippy::cast_possible_truncation)]
    let expires_at = chrono::Duration::try_milliseconds((expires_in * 1_000.0).round() as i64)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or(UsageError::TokenExpiryInvalid)?;

    Ok(RefreshedTokens {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.to_string(),
        expires_at,
        expires_at_storage: json!(expires_at.timestamp()),
    })
}

/// Best-effort human-readable message from an error body.
///
/// Checks, in order: `error` as a string (joined with `error_description`
/// when present), `error.message`, `error_description`, `message`.
pub fn parse_error_message(body: &[u8]) -> Option<String> {
    let Ok(Value::Object(json)) = serde_json::from_slice::<Value>(body) else {
        return None;
    };

    if let Some(error) = json.get("error").and_then(Value::as_str) {
        return Some(match json.get("error_description").and_then(Value::as_str) {
            Some(description) => format!("{error}: {description}"),
            None => error.to_string(),
        });
    }

    if let Some(message) = json
        .get("error")
        .and_then(Value::as_object)
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
    {
        return Some(message.to_string());
    }

    string_field(&json, &["error_description", "message"]).map(ToString::to_string)
}

// ============================================================================
// Token Client
// ============================================================================

/// Client for the identity provider's token endpoint.
#[derive(Debug, Clone)]
pub struct OAuthTokenClient {
    http: HttpClient,
    config: OAuthConfig,
}

impl OAuthTokenClient {
    /// Creates a token client.
    pub fn new(http: HttpClient, config: OAuthConfig) -> Self {
        Self { http, config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Exchanges an authorization code for tokens.
    #[instrument(skip(self, code, state, code_verifier))]
    pub async fn exchange_authorization_code(
        &self,
        code: &str,
        state: &str,
        code_verifier: &str,
    ) -> Result<RefreshedTokens, UsageError> {
        let body = json!({
            "grant_type": "authorization_code",
            "code": code,
            "redirect_uri": self.config.redirect_uri,
            "client_id": self.config.client_id,
            "code_verifier": code_verifier,
            "state": state,
        });

        self.token_request("authorization_code", &body, self.config.exchange_timeout)
            .await
    }

    /// Exchanges a refresh token for new tokens.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh_tokens(&self, refresh_token: &str) -> Result<RefreshedTokens, UsageError> {
        let body = json!({
            "grant_type": "refresh_token",
            "refresh_token": refresh_token,
            "client_id": self.config.client_id,
            "scope": self.config.refresh_scopes.join(" "),
        });

        self.token_request("refresh_token", &body, self.config.refresh_timeout)
            .await
    }

    async fn token_request(
        &self,
        grant_type: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<RefreshedTokens, UsageError> {
        debug!(grant_type = %grant_type, url = %self.config.token_url, "Requesting OAuth tokens");

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let response = self
            .http
            .post_json(&self.config.token_url, headers, body, timeout)
            .await?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| UsageError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = parse_error_message(&bytes);
            warn!(grant_type = %grant_type, status = %status, message = ?message, "Token request failed");
            return Err(UsageError::http(status.as_u16(), message));
        }

        let tokens = parse_token_response(&bytes, Utc::now())?;
        debug!(grant_type = %grant_type, expires_at = %tokens.expires_at, "OAuth tokens received");
        Ok(tokens)
    }
}

// ============================================================================
// Tests
// ============================================================================
