//! Status command - which credential a fetch would use.

use anyhow::Result;
use chrono::Utc;
use claude_usage_store::{Config, WidgetSnapshotStore};

use crate::commands::build_service;
use crate::output::{JsonFormatter, StatusOutput, TextFormatter};
use crate::{Cli, OutputFormat};

/// Runs the status command. Never refreshes.
pub async fn run(cli: &Cli, config: &Config) -> Result<()> {
    let service = build_service(config)?;

    let status = service.credential_status().await?;
    let signed_in_app = service.is_authenticated().await;
    let snapshot = WidgetSnapshotStore::default().load().await;

    let output = StatusOutput::new(&status, Utc::now(), signed_in_app, snapshot.as_ref());

    match cli.format {
        OutputFormat::Text => {
            println!("{}", TextFormatter::new(!cli.no_color).format_status(&output));
        }
        OutputFormat::Json => {
            println!("{}", JsonFormatter::new(cli.pretty).format(&output)?);
        }
    }
    Ok(())
}
