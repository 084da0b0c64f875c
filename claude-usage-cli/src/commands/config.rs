//! Config command - manage configuration.

use anyhow::Result;
use clap::{Args, Subcommand};
use claude_usage_fetch::host::file::default_credentials_path;
use claude_usage_store::{
    Config, MenuBarDisplay, SettingsStore, default_config_dir, default_config_path,
    default_settings_path, default_snapshot_path, remove_file_if_exists,
};
use tracing::info;

use crate::commands::oauth_config;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration.
    Show,

    /// Show configuration paths.
    Path,

    /// Set what the menu bar label shows.
    MenuBar {
        /// `primary` (highest of 5h/7d) or `both`.
        display: MenuBarDisplay,
    },

    /// Reset settings and configuration to defaults.
    Reset,
}

/// Runs the config command.
pub async fn run(args: &ConfigArgs, cli: &Cli, config: &Config) -> Result<()> {
    match &args.action {
        ConfigAction::Show => show_config(cli, config).await,
        ConfigAction::Path => show_paths(cli),
        ConfigAction::MenuBar { display } => set_menu_bar(*display, cli).await,
        ConfigAction::Reset => reset_config(cli).await,
    }
}

async fn show_config(cli: &Cli, config: &Config) -> Result<()> {
    let settings = SettingsStore::load_default().await.get().await;
    let oauth = oauth_config(config);

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.bold("Claude Usage Configuration"));
            println!("{}", "─".repeat(40));
            println!();
            println!("Menu bar:         {}", settings.menu_bar_display);
            println!("Refresh interval: {}s", config.refresh_interval_secs);
            println!("Log level:        {}", config.log_level);
            println!();
            println!("OAuth client id:  {}", oauth.client_id);
            println!("Authorize scopes: {}", oauth.authorize_scopes.join(" "));
            println!("Refresh scopes:   {}", oauth.refresh_scopes.join(" "));
        }
        OutputFormat::Json => {
            let body = serde_json::json!({
                "settings": settings,
                "config": config,
                "oauth": {
                    "clientId": oauth.client_id,
                    "authorizeScopes": oauth.authorize_scopes,
                    "refreshScopes": oauth.refresh_scopes,
                },
            });
            println!("{}", JsonFormatter::new(cli.pretty).format(&body)?);
        }
    }

    Ok(())
}

fn show_paths(cli: &Cli) -> Result<()> {
    let config_dir = default_config_dir();
    let config_path = default_config_path();
    let settings_path = default_settings_path();
    let snapshot_path = default_snapshot_path();
    let credentials_path = default_credentials_path();

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Config dir:       {}", config_dir.display());
            println!("Config file:      {}", config_path.display());
            println!("Settings file:    {}", settings_path.display());
            println!("Widget snapshot:  {}", snapshot_path.display());
            if let Some(ref path) = credentials_path {
                println!("CLI credentials:  {}", path.display());
            }
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_dir": config_dir.display().to_string(),
                "config_file": config_path.display().to_string(),
                "settings_file": settings_path.display().to_string(),
                "widget_snapshot": snapshot_path.display().to_string(),
                "cli_credentials": credentials_path.map(|p| p.display().to_string()),
            });
            println!("{}", JsonFormatter::new(cli.pretty).format(&paths)?);
        }
    }

    Ok(())
}

async fn set_menu_bar(selection: MenuBarDisplay, _cli: &Cli) -> Result<()> {
    let store = SettingsStore::load_default().await;
    save_menu_bar(&store, selection).await?;
    println!("Menu bar display set to: {selection}");

    Ok(())
}

/// Stores the menu bar selection and persists the settings file.
async fn save_menu_bar(store: &SettingsStore, selection: MenuBarDisplay) -> Result<()> {
    store.set_menu_bar_display(selection).await;
    store.save().await?;

    info!(menu_bar = %selection, path = %store.path().display(), "Menu bar display updated");
    Ok(())
}

async fn reset_config(_cli: &Cli) -> Result<()> {
    let mut removed = false;
    for path in [default_settings_path(), default_config_path()] {
        if remove_file_if_exists(&path).await? {
            info!(path = %path.display(), "Removed");
            removed = true;
        }
    }

    if removed {
        println!("Configuration reset to defaults");
    } else {
        println!("No configuration file to reset");
    }

    Ok(())
}
