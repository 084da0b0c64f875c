//! Usage service: credential loading, conditional refresh, and the usage call.
//!
//! # API Endpoint
//!
//! ```text
//! GET https://api.anthropic.com/api/oauth/usage
//! Authorization: Bearer <access_token>
//! anthropic-beta: oauth-2025-04-20
//! Accept: application/json
//! ```
//!
//! # Ownership
//!
//! Credentials come from one of two owners. The in-app account is read
//! first and is the only record this service ever rotates or writes. When it
//! is absent the Claude CLI's record is used read-only: its access token is
//! sent as-is even past expiry, and a 401 from the API drives an in-app login
//! instead of a refresh.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use claude_usage_core::{
    CredentialOwnership, OAuthCredentials, StoredCredentialRecord, UsageError, UsageResponse,
};
use reqwest::header::{self, HeaderMap, HeaderValue};
use tracing::{debug, info, instrument, warn};

use crate::error::KeychainError;
use crate::host::file::CredentialsFile;
use crate::host::http::{DEFAULT_ALLOWED_DOMAINS, HttpClient};
use crate::host::keychain::{CredentialStore, IN_APP_ACCOUNT, StoredEntry, SystemKeychain};
use crate::oauth::{OAuthAuthorizationSession, OAuthConfig, OAuthTokenClient};

// ============================================================================
// Constants
// ============================================================================

/// Usage endpoint.
pub const DEFAULT_USAGE_URL: &str = "https://api.anthropic.com/api/oauth/usage";

/// Value of the `anthropic-beta` header required by the usage endpoint.
pub const OAUTH_BETA_HEADER: &str = "oauth-2025-04-20";

/// Tokens expiring within this window are refreshed before use.
pub const REFRESH_SKEW: Duration = Duration::from_secs(300);

/// Timeout for the usage request.
pub const USAGE_TIMEOUT: Duration = Duration::from_secs(15);

// ============================================================================
// Configuration
// ============================================================================

/// Usage service settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageServiceConfig {
    /// Usage endpoint.
    pub usage_url: String,
    /// `anthropic-beta` header value.
    pub beta_header: String,
    /// Refresh window before expiry.
    pub refresh_skew: Duration,
    /// Usage request timeout.
    pub usage_timeout: Duration,
    /// Account the app's own credentials live under.
    pub in_app_account: String,
    /// Domains bearer tokens may be sent to. `None` disables the check.
    pub allowed_domains: Option<Vec<String>>,
}

impl Default for UsageServiceConfig {
    fn default() -> Self {
        Self {
            usage_url: DEFAULT_USAGE_URL.to_string(),
            beta_header: OAUTH_BETA_HEADER.to_string(),
            refresh_skew: REFRESH_SKEW,
            usage_timeout: USAGE_TIMEOUT,
            in_app_account: IN_APP_ACCOUNT.to_string(),
            allowed_domains: Some(DEFAULT_ALLOWED_DOMAINS.iter().map(ToString::to_string).collect()),
        }
    }
}

// ============================================================================
// Credential Status
// ============================================================================

/// Which stored record a fetch would use, without refreshing it.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialStatus {
    /// Owner of the record.
    pub ownership: CredentialOwnership,
    /// Service namespace the record was found in.
    pub service: String,
    /// Account the record was found under.
    pub account: String,
    /// When the access token expires.
    pub expires_at: DateTime<Utc>,
}

impl CredentialStatus {
    /// Seconds until expiry. Negative once expired.
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds()
    }

    /// Returns true if the access token has expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A record loaded for one operation.
struct LoadedCredentials {
    record: StoredCredentialRecord,
    credentials: OAuthCredentials,
    ownership: CredentialOwnership,
    service: String,
    account: String,
}

// ============================================================================
// Usage Service
// ============================================================================

/// Orchestrates credential loading, refresh, login completion, and usage fetches.
///
/// Holds no mutable state. Callers serialize concurrent fetches themselves.
pub struct UsageService {
    config: UsageServiceConfig,
    http: HttpClient,
    token_client: OAuthTokenClient,
    in_app: Arc<dyn CredentialStore>,
    foreign: Vec<Arc<dyn CredentialStore>>,
}

impl std::fmt::Debug for UsageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageService")
            .field("config", &self.config)
            .field("in_app", &self.in_app.service())
            .field(
                "foreign",
                &self.foreign.iter().map(|s| s.service()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl UsageService {
    /// Creates a service over explicit stores.
    ///
    /// `foreign` sources are tried in order when the in-app account is empty.
    ///
    /// # Errors
    ///
    /// Fails with [`UsageError::Network`] if the HTTP client cannot be built.
    pub fn new(
        config: UsageServiceConfig,
        oauth_config: OAuthConfig,
        in_app: Arc<dyn CredentialStore>,
        foreign: Vec<Arc<dyn CredentialStore>>,
    ) -> Result<Self, UsageError> {
        let http = match config.allowed_domains.clone() {
            Some(domains) => HttpClient::with_allowed_domains(domains)?,
            None => HttpClient::new()?,
        };
        let token_client = OAuthTokenClient::new(http.clone(), oauth_config);

        Ok(Self {
            config,
            http,
            token_client,
            in_app,
            foreign,
        })
    }

    /// Creates a service over the platform keychain.
    ///
    /// The in-app account shares the Claude CLI's keychain service. Foreign
    /// sources are the CLI's keychain entry, then its credentials file.
    ///
    /// # Errors
    ///
    /// Fails with [`UsageError::Network`] if the HTTP client cannot be built.
    pub fn with_system_stores(
        config: UsageServiceConfig,
        oauth_config: OAuthConfig,
    ) -> Result<Self, UsageError> {
        let keychain: Arc<dyn CredentialStore> = Arc::new(SystemKeychain::claude_cli());
        let mut foreign = vec![Arc::clone(&keychain)];
        if let Some(file) = CredentialsFile::claude_cli() {
            foreign.push(Arc::new(file));
        }
        Self::new(config, oauth_config, keychain, foreign)
    }

    /// Returns the service configuration.
    pub fn config(&self) -> &UsageServiceConfig {
        &self.config
    }

    /// Returns the identity-provider configuration.
    pub fn oauth_config(&self) -> &OAuthConfig {
        self.token_client.config()
    }

    // ========================================================================
    // Login
    // ========================================================================

    /// Starts a browser login: fresh PKCE verifier, challenge, and state.
    pub fn create_oauth_authorization_session(&self) -> OAuthAuthorizationSession {
        OAuthAuthorizationSession::new(self.token_client.config())
    }

    /// Exchanges an authorization code and stores the tokens under the in-app account.
    ///
    /// Existing content of the in-app record other than the three token
    /// fields is preserved.
    ///
    /// # Errors
    ///
    /// [`UsageError::OAuthCodeMissing`] for a blank code, exchange errors
    /// from the token endpoint, or [`UsageError::KeychainWriteFailed`].
    #[instrument(skip(self, code, state, code_verifier))]
    pub async fn complete_oauth_authorization(
        &self,
        code: &str,
        state: &str,
        code_verifier: &str,
    ) -> Result<(), UsageError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(UsageError::OAuthCodeMissing);
        }

        let tokens = self
            .token_client
            .exchange_authorization_code(code, state, code_verifier)
            .await?;

        let account = &self.config.in_app_account;
        let mut record = match self.in_app.read(account).await {
            Ok(Some(entry)) => StoredCredentialRecord::from_slice_or_empty(&entry.data),
            Ok(None) => StoredCredentialRecord::new(),
            Err(e) => {
                warn!(account = %account, error = %e, "Could not read in-app record, starting fresh");
                StoredCredentialRecord::new()
            }
        };

        record.merge_tokens(
            &tokens.access_token,
            &tokens.refresh_token,
            tokens.expires_at_storage.clone(),
        );
        self.write_in_app(account, &record).await?;

        info!(account = %account, expires_at = %tokens.expires_at, "In-app login completed");
        Ok(())
    }

    /// Returns true if the in-app account holds a record.
    pub async fn is_authenticated(&self) -> bool {
        matches!(self.in_app.read(&self.config.in_app_account).await, Ok(Some(_)))
    }

    /// Deletes the in-app record. The Claude CLI's record is never touched.
    ///
    /// # Errors
    ///
    /// [`UsageError::KeychainWriteFailed`] if the store refuses the delete.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), UsageError> {
        let account = &self.config.in_app_account;
        self.in_app
            .delete(account)
            .await
            .map_err(|e| UsageError::KeychainWriteFailed(e.to_string()))?;
        info!(account = %account, "Signed out");
        Ok(())
    }

    /// Reports which record a fetch would use and when it expires.
    ///
    /// # Errors
    ///
    /// The same credential errors [`fetch_usage`](Self::fetch_usage) reports.
    pub async fn credential_status(&self) -> Result<CredentialStatus, UsageError> {
        let loaded = self.load_credentials().await?;
        Ok(CredentialStatus {
            ownership: loaded.ownership,
            service: loaded.service,
            account: loaded.account,
            expires_at: loaded.credentials.expires_at,
        })
    }

    // ========================================================================
    // Usage
    // ========================================================================

    /// Fetches current usage, refreshing app-owned tokens near expiry.
    ///
    /// # Errors
    ///
    /// Any [`UsageError`] kind. Nothing is retried.
    #[instrument(skip(self))]
    pub async fn fetch_usage(&self) -> Result<UsageResponse, UsageError> {
        let loaded = self.load_credentials().await?;
        let credentials = self.refresh_if_needed(loaded).await?;
        self.request_usage(&credentials.access_token).await
    }

    async fn load_credentials(&self) -> Result<LoadedCredentials, UsageError> {
        let (entry, service, ownership) = self.read_preferred_entry().await?;
        let record = StoredCredentialRecord::from_slice(&entry.data)?;
        let credentials = record.credentials()?;

        debug!(
            ownership = %ownership,
            service = %service,
            account = %entry.account,
            expires_at = %credentials.expires_at,
            "Loaded stored credentials"
        );

        Ok(LoadedCredentials {
            record,
            credentials,
            ownership,
            service,
            account: entry.account,
        })
    }

    async fn read_preferred_entry(
        &self,
    ) -> Result<(StoredEntry, String, CredentialOwnership), UsageError> {
        let account = &self.config.in_app_account;
        match self.in_app.read(account).await {
            Ok(Some(entry)) => {
                return Ok((
                    entry,
                    self.in_app.service().to_string(),
                    CredentialOwnership::OwnedByApp,
                ));
            }
            Ok(None) => {}
            Err(e) => {
                warn!(account = %account, error = %e, "In-app credential unreadable, trying foreign sources");
            }
        }

        let mut first_error: Option<KeychainError> = None;
        for source in &self.foreign {
            match source.read_any().await {
                Ok(Some(entry)) => {
                    return Ok((
                        entry,
                        source.service().to_string(),
                        CredentialOwnership::ForeignReadOnly,
                    ));
                }
                Ok(None) => {
                    debug!(service = %source.service(), "No foreign credential");
                }
                Err(e) => {
                    debug!(service = %source.service(), error = %e, "Foreign credential unreadable");
                    first_error.get_or_insert(e);
                }
            }
        }

        Err(first_error.map_or(UsageError::KeychainNotFound, UsageError::from))
    }

    async fn refresh_if_needed(
        &self,
        loaded: LoadedCredentials,
    ) -> Result<OAuthCredentials, UsageError> {
        let now = Utc::now();
        let skew = chrono::Duration::from_std(self.config.refresh_skew)
            .unwrap_or_else(|_| chrono::Duration::seconds(300));
        let seconds_left = (loaded.credentials.expires_at - now).num_seconds();

        if !loaded.credentials.expires_within(skew, now) {
            return Ok(loaded.credentials);
        }

        if !loaded.ownership.may_rotate() {
            debug!(
                ownership = %loaded.ownership,
                seconds_left,
                "Token near expiry but not owned, using as-is"
            );
            return Ok(loaded.credentials);
        }

        info!(account = %loaded.account, seconds_left, "Refreshing in-app OAuth token");

        let tokens = self
            .token_client
            .refresh_tokens(&loaded.credentials.refresh_token)
            .await?;

        let mut record = loaded.record;
        record.merge_tokens(
            &tokens.access_token,
            &tokens.refresh_token,
            tokens.expires_at_storage.clone(),
        );
        self.write_in_app(&loaded.account, &record).await?;

        Ok(OAuthCredentials {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens.expires_at,
        })
    }

    async fn write_in_app(
        &self,
        account: &str,
        record: &StoredCredentialRecord,
    ) -> Result<(), UsageError> {
        self.in_app
            .write(account, &record.to_vec())
            .await
            .map_err(|e| match e {
                KeychainError::WriteFailed(cause) => UsageError::KeychainWriteFailed(cause),
                other => UsageError::KeychainWriteFailed(other.to_string()),
            })
    }

    async fn request_usage(&self, access_token: &str) -> Result<UsageResponse, UsageError> {
        let mut authorization = HeaderValue::from_str(&format!("Bearer {access_token}"))
            .map_err(|_| UsageError::TokenMissing)?;
        authorization.set_sensitive(true);

        let beta = HeaderValue::from_str(&self.config.beta_header)
            .map_err(|e| UsageError::Network(format!("invalid beta header: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, authorization);
        headers.insert("anthropic-beta", beta);
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let response = self
            .http
            .get_with_headers(&self.config.usage_url, headers, self.config.usage_timeout)
            .await?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| UsageError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = crate::oauth::parse_error_message(&bytes);
            warn!(status = %status, message = ?message, "Usage request failed");
            return Err(UsageError::http(status.as_u16(), message));
        }

        let usage: UsageResponse =
            serde_json::from_slice(&bytes).map_err(|e| UsageError::Decoding(e.to_string()))?;

        debug!(
            five_hour = usage.five_hour.utilization,
            seven_day = usage.seven_day.utilization,
            "Usage fetched"
        );
        Ok(usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryKeychain;
    use chrono::TimeZone;

    fn service(in_app: MemoryKeychain, foreign: Vec<MemoryKeychain>) -> UsageService {
        UsageService::new(
            UsageServiceConfig::default(),
            OAuthConfig::default(),
            Arc::new(in_app),
            foreign
                .into_iter()
                .map(|s| Arc::new(s) as Arc<dyn CredentialStore>)
                .collect(),
        )
        .unwrap()
    }

    fn blob(expires_at: i64) -> Vec<u8> {
        format!(
            r#"{{"claudeAiOauth":{{"accessToken":"a","refreshToken":"r","expiresAt":{expires_at}}}}}"#
        )
        .into_bytes()
    }

    #[test]
    fn test_default_config() {
        let config = UsageServiceConfig::default();
        assert_eq!(config.usage_url, "https://api.anthropic.com/api/oauth/usage");
        assert_eq!(config.beta_header, "oauth-2025-04-20");
        assert_eq!(config.refresh_skew, Duration::from_secs(300));
        assert_eq!(config.in_app_account, "claude-usage-in-app-oauth");
    }

    #[tokio::test]
    async fn test_prefers_in_app_record() {
        let svc = service(
            MemoryKeychain::with_entry("svc", IN_APP_ACCOUNT, blob(1_900_000_000)),
            vec![MemoryKeychain::with_entry("svc", "alice", blob(1_800_000_000))],
        );

        let status = svc.credential_status().await.unwrap();
        assert_eq!(status.ownership, CredentialOwnership::OwnedByApp);
        assert_eq!(status.account, IN_APP_ACCOUNT);
        assert!(svc.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_falls_back_to_foreign_record() {
        let svc = service(
            MemoryKeychain::new("svc"),
            vec![
                MemoryKeychain::new("empty"),
                MemoryKeychain::with_entry("cli", "alice", blob(1_800_000_000)),
            ],
        );

        let status = svc.credential_status().await.unwrap();
        assert_eq!(status.ownership, CredentialOwnership::ForeignReadOnly);
        assert_eq!(status.service, "cli");
        assert_eq!(status.account, "alice");
        assert_eq!(status.expires_at, Utc.timestamp_opt(1_800_000_000, 0).unwrap());
        assert!(!svc.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_no_record_anywhere() {
        let svc = service(MemoryKeychain::new("svc"), vec![MemoryKeychain::new("cli")]);
        assert_eq!(
            svc.credential_status().await,
            Err(UsageError::KeychainNotFound)
        );
    }

    #[tokio::test]
    async fn test_foreign_record_without_account() {
        let svc = service(
            MemoryKeychain::new("svc"),
            vec![MemoryKeychain::with_entry("cli", "", blob(1_800_000_000))],
        );
        assert_eq!(
            svc.credential_status().await,
            Err(UsageError::KeychainAccountMissing)
        );
    }

    #[tokio::test]
    async fn test_sign_out_only_removes_in_app_record() {
        let in_app = Arc::new(MemoryKeychain::with_entry(
            "svc",
            IN_APP_ACCOUNT,
            blob(1_900_000_000),
        ));
        let cli = Arc::new(MemoryKeychain::with_entry("cli", "alice", blob(1_800_000_000)));
        let svc = UsageService::new(
            UsageServiceConfig::default(),
            OAuthConfig::default(),
            in_app.clone(),
            vec![cli.clone() as Arc<dyn CredentialStore>],
        )
        .unwrap();

        svc.sign_out().await.unwrap();

        assert!(in_app.get(IN_APP_ACCOUNT).is_none());
        assert!(cli.get("alice").is_some());
        assert_eq!(
            svc.credential_status().await.unwrap().ownership,
            CredentialOwnership::ForeignReadOnly
        );
    }

    #[tokio::test]
    async fn test_blank_code_is_rejected_before_exchange() {
        let svc = service(MemoryKeychain::new("svc"), vec![]);
        assert_eq!(
            svc.complete_oauth_authorization("  \n", "state", "verifier").await,
            Err(UsageError::OAuthCodeMissing)
        );
    }

    #[test]
    fn test_credential_status_expiry() {
        let now = Utc.timestamp_opt(1_000, 0).unwrap();
        let status = CredentialStatus {
            ownership: CredentialOwnership::OwnedByApp,
            service: "svc".into(),
            account: "acct".into(),
            expires_at: Utc.timestamp_opt(1_060, 0).unwrap(),
        };
        assert_eq!(status.seconds_until_expiry(now), 60);
        assert!(!status.is_expired(now));
        assert!(status.is_expired(Utc.timestamp_opt(1_060, 0).unwrap()));
    }
}
