//! Logout command - remove the app-owned credential.

use anyhow::Result;
use claude_usage_store::{Config, WidgetSnapshotStore};
use tracing::info;

use crate::commands::build_service;
use crate::output::JsonFormatter;
use crate::{Cli, OutputFormat};

/// Runs the logout command.
///
/// The Claude CLI's own credential is left alone.
pub async fn run(cli: &Cli, config: &Config) -> Result<()> {
    let service = build_service(config)?;

    let was_signed_in = service.is_authenticated().await;
    if was_signed_in {
        service.sign_out().await?;
    }
    WidgetSnapshotStore::default().clear().await?;
    info!(was_signed_in, "Signed out");

    match cli.format {
        OutputFormat::Text => {
            if was_signed_in {
                println!("Signed out.");
            } else {
                println!("No in-app credential to remove.");
            }
        }
        OutputFormat::Json => {
            let body = serde_json::json!({ "signedOut": was_signed_in });
            println!("{}", JsonFormatter::new(cli.pretty).format(&body)?);
        }
    }
    Ok(())
}
