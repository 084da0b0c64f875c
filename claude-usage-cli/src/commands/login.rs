//! Login command - paste-based OAuth sign-in.

use anyhow::{Result, bail};
use clap::Args;
use claude_usage_fetch::InAppLogin;
use claude_usage_store::Config;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::commands::build_service;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the login command.
#[derive(Args, Default)]
pub struct LoginArgs {
    /// Callback URL or `code#state` to use instead of prompting.
    #[arg(long)]
    pub code: Option<String>,
}

/// Runs the login command.
pub async fn run(args: &LoginArgs, cli: &Cli, config: &Config) -> Result<()> {
    let service = build_service(config)?;
    let formatter = TextFormatter::new(!cli.no_color);
    let mut login = InAppLogin::new();

    let session = login.begin(&service);
    eprintln!("Open this URL in your browser and sign in:\n");
    eprintln!("  {}\n", session.authorization_url);

    let input = match args.code {
        Some(ref code) => code.clone(),
        None => {
            eprintln!("{}", formatter.dim("Then paste the code shown (or the full callback URL):"));
            read_line().await?
        }
    };

    if input.trim().is_empty() {
        login.cancel();
        bail!("No code entered, login cancelled");
    }

    login.complete_with_input(&service, &input).await?;
    info!(account = %service.config().in_app_account, "Signed in");

    match cli.format {
        OutputFormat::Text => println!("Signed in. Usage will now use the in-app credential."),
        OutputFormat::Json => {
            let body = serde_json::json!({
                "signedIn": true,
                "account": service.config().in_app_account,
            });
            println!("{}", JsonFormatter::new(cli.pretty).format(&body)?);
        }
    }
    Ok(())
}

async fn read_line() -> Result<String> {
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line)
}
