//! Interactive translation-key console
//!
//! Usage:
//!   cargo run                    # connect to TRANSLATION_API_URL (default http://localhost:8000)
//!   RUST_LOG=debug cargo run     # also log requests and cache traffic to stderr
//!
//! Optional environment variables:
//! - TRANSLATION_API_URL
//! - TRANSLATION_EDITOR_ID (defaults to console_user)
//! - CONSOLE_STATE_FILE (defaults to translation-storage.json)
//! - QUERY_RETRY_DELAY_MS, LIST_STALE_SECS, STATS_STALE_SECS

use anyhow::{Context, Result};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use translation_console::config::Config;
use translation_console::console::{Command, Console, Outcome};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so they don't interleave with the table output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("translation_console=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    info!(
        "Connecting to {} (state file: {})",
        config.api_base_url,
        config.state_file.display()
    );

    let mut console = Console::from_config(&config);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if let Outcome::Continue(text) = console.execute(Command::List).await {
        print!("{}", text);
    }

    loop {
        print!("{}", console.prompt());
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                println!("! {}", e);
                continue;
            }
        };

        match console.execute(command).await {
            Outcome::Continue(text) => print!("{}", text),
            Outcome::Quit => break,
        }
    }

    console.client().settled().await;
    info!("{}", console.client().metrics().format_summary());
    Ok(())
}
