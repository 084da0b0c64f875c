//! CLI command implementations.

pub mod config;
pub mod login;
pub mod logout;
pub mod status;
pub mod usage;
pub mod watch;

use anyhow::Result;
use claude_usage_fetch::{OAuthConfig, UsageService, UsageServiceConfig};
use claude_usage_store::Config;

/// Applies the config file's OAuth overrides to the built-in defaults.
pub fn oauth_config(config: &Config) -> OAuthConfig {
    let mut oauth = OAuthConfig::default();
    if let Some(ref client_id) = config.client_id {
        oauth.client_id.clone_from(client_id);
    }
    if let Some(ref scopes) = config.authorize_scopes {
        oauth.authorize_scopes.clone_from(scopes);
    }
    if let Some(ref scopes) = config.refresh_scopes {
        oauth.refresh_scopes.clone_from(scopes);
    }
    oauth
}

/// Builds a service over the system keychain and the CLI credentials file.
pub fn build_service(config: &Config) -> Result<UsageService> {
    let service = UsageService::with_system_stores(UsageServiceConfig::default(), oauth_config(config))?;
    Ok(service)
}
