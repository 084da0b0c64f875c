//! Usage command - fetch and display rate-limit usage.

use anyhow::Result;
use clap::Args;
use claude_usage_store::{Config, SettingsStore, WidgetSnapshot, WidgetSnapshotStore};
use tracing::{info, warn};

use crate::commands::build_service;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the usage command.
#[derive(Args, Default)]
pub struct UsageArgs {
    /// Don't update the widget snapshot.
    #[arg(long)]
    pub no_snapshot: bool,
}

/// Runs the usage command.
pub async fn run(args: &UsageArgs, cli: &Cli, config: &Config) -> Result<()> {
    let service = build_service(config)?;

    info!("Fetching usage");
    let usage = service.fetch_usage().await?;
    let snapshot = WidgetSnapshot::now(usage);

    if !args.no_snapshot {
        save_snapshot(&WidgetSnapshotStore::default(), &snapshot).await;
    }

    let settings = SettingsStore::load_default().await;
    let label = settings.menu_bar_label(Some(&snapshot.usage)).await;
    print_snapshot(&snapshot, &label, cli)
}

/// Writes the snapshot for widgets. Failure only costs widget freshness.
pub async fn save_snapshot(store: &WidgetSnapshotStore, snapshot: &WidgetSnapshot) {
    if let Err(e) = store.save(snapshot).await {
        warn!(path = %store.path().display(), error = %e, "Failed to save widget snapshot");
    }
}

/// Prints a snapshot in the selected format.
pub fn print_snapshot(snapshot: &WidgetSnapshot, label: &str, cli: &Cli) -> Result<()> {
    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_usage(snapshot, label));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format_usage(snapshot, label)?);
        }
    }
    Ok(())
}
