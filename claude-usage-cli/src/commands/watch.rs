//! Watch command - periodic usage refresh.

use anyhow::Result;
use clap::Args;
use claude_usage_store::{
    Config, MIN_REFRESH_INTERVAL_SECS, RefreshState, SettingsStore, WidgetSnapshot,
    WidgetSnapshotStore,
};
use claude_usage_fetch::UsageService;
use std::io::{Write, stdout};
use tokio::time::{Duration, Interval, MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::commands::build_service;
use crate::commands::usage::{print_snapshot, save_snapshot};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for watch command.
#[derive(Args)]
pub struct WatchArgs {
    /// Refresh interval in seconds (default from config, minimum 60).
    #[arg(long, short)]
    pub interval: Option<u64>,
}

/// Clamps the requested interval to the allowed minimum.
fn effective_interval(requested: Option<u64>, config: &Config) -> u64 {
    requested
        .unwrap_or(config.refresh_interval_secs)
        .max(MIN_REFRESH_INTERVAL_SECS)
}

/// Runs the watch command until Ctrl+C.
pub async fn run(args: &WatchArgs, cli: &Cli, config: &Config) -> Result<()> {
    let refresh_secs = effective_interval(args.interval, config);
    info!(interval = refresh_secs, "Starting watch mode");

    let service = build_service(config)?;
    let state = RefreshState::new();
    let snapshots = WidgetSnapshotStore::default();
    let settings = SettingsStore::load_default().await;

    let (service, state, snapshots, settings) = (&service, &state, &snapshots, &settings);
    let ticker = interval(Duration::from_secs(refresh_secs));
    let shutdown = tokio::signal::ctrl_c();
    run_until(ticker, shutdown, move || async move {
        refresh(service, state, snapshots).await;
        render(state, settings, refresh_secs, cli).await
    })
    .await
}

/// Runs `tick` on every interval tick until `shutdown` resolves.
///
/// The shutdown future is created once, so a signal that arrives while a tick
/// is running still stops the loop before the next one.
async fn run_until<S, F, Fut>(mut ticker: Interval, shutdown: S, mut tick: F) -> Result<()>
where
    S: Future,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                debug!("Watch interrupted");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        tick().await?;
    }
}

/// Runs one fetch through the busy flag.
async fn refresh(service: &UsageService, state: &RefreshState, snapshots: &WidgetSnapshotStore) {
    if state.try_begin().await.is_err() {
        debug!("Previous refresh still running, skipping tick");
        return;
    }

    let result = service.fetch_usage().await;
    if let Ok(ref usage) = result {
        save_snapshot(snapshots, &WidgetSnapshot::now(usage.clone())).await;
    }
    state.finish(result).await;
}

async fn render(
    state: &RefreshState,
    settings: &SettingsStore,
    refresh_secs: u64,
    cli: &Cli,
) -> Result<()> {
    let usage = state.usage().await;
    let last_error = state.last_error().await;
    let label = settings.menu_bar_label(usage.as_ref()).await;

    if cli.format == OutputFormat::Json {
        // One line per tick.
        let body = serde_json::json!({
            "usage": usage,
            "lastUpdated": state.last_updated().await,
            "error": last_error.as_ref().map(ToString::to_string),
            "loginRequired": state.should_offer_login().await,
            "menuBarLabel": label,
        });
        println!("{}", JsonFormatter::new(false).format(&body)?);
        return Ok(());
    }

    let formatter = TextFormatter::new(!cli.no_color);

    print!("\x1b[2J\x1b[H");
    stdout().flush()?;

    let now = chrono::Local::now();
    println!(
        "Claude Usage Watch - {} (refresh: {}s)",
        now.format("%H:%M:%S"),
        refresh_secs
    );
    println!("{}", "─".repeat(50));
    println!();

    match (usage, state.last_updated().await) {
        (Some(usage), Some(fetched_at)) => {
            print_snapshot(&WidgetSnapshot { usage, fetched_at }, &label, cli)?;
        }
        _ => println!("{}", formatter.dim("No usage fetched yet")),
    }

    if let Some(error) = last_error {
        println!();
        println!("{}", formatter.format_error(&error));
    }

    println!();
    println!("Press Ctrl+C to exit");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_interval() {
        let config = Config::default();
        assert_eq!(effective_interval(None, &config), 300);
        assert_eq!(effective_interval(Some(120), &config), 120);
        assert_eq!(effective_interval(Some(5), &config), 60);

        let custom = Config {
            refresh_interval_secs: 900,
            ..Default::default()
        };
        assert_eq!(effective_interval(None, &custom), 900);
    }

    #[tokio::test]
    async fn test_shutdown_during_tick_stops_before_next_tick() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let mut tx = Some(tx);
        let mut ticks = 0;

        let result = run_until(interval(Duration::from_millis(10)), rx, || {
            ticks += 1;
            let signal = tx.take();
            async move {
                if let Some(signal) = signal {
                    let _ = signal.send(());
                }
                // Outlast the interval so the next tick is already due.
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<(), anyhow::Error>(())
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(ticks, 1);
    }

    #[tokio::test]
    async fn test_tick_error_ends_loop() {
        let (_tx, rx) = tokio::sync::oneshot::channel::<()>();
        let result = run_until(interval(Duration::from_millis(10)), rx, || async {
            Err::<(), _>(anyhow::anyhow!("render failed"))
        })
        .await;

        assert_eq!(result.unwrap_err().to_string(), "render failed");
    }
}
