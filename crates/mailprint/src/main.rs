//! `mailprint` - prints unread mail.
//!
//! Runs one cycle: every unread message in the source folder is printed,
//! moved to the destination folder and marked read.
//!
//! ```text
//! mailprint [CONFIG] [VERBOSITY]
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use mailprint_core::settings::{DEFAULT_PATH, Settings};
use mailprint_core::{CommandSpooler, Monitor, session};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "mailprint", version, about)]
struct Cli {
    /// Settings file.
    #[arg(default_value = DEFAULT_PATH)]
    config: PathBuf,

    /// Overrides `debug_level`: 0 quiet, 1 every stage, 2 raw protocol.
    verbosity: Option<u8>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(&cli.config)
        .with_context(|| format!("Cannot load settings from {}", cli.config.display()))?;
    if let Some(level) = cli.verbosity {
        settings = settings.with_debug_level(level);
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter(settings.debug_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let spooler = CommandSpooler::locate(&settings).context("Missing prerequisite")?;

    info!(
        "Accessing account {} on {} and moving unread messages from {} to {}",
        settings.username, settings.imap_uri, settings.source_folder, settings.destination_folder
    );

    let session = session::connect(&settings)
        .await
        .with_context(|| format!("{} - login failed", settings.username))?;

    let mut monitor = Monitor::new(&settings, spooler);
    let (mut session, report) = monitor.run_cycle(session).await.context("Cycle aborted")?;
    info!(
        found = report.found,
        printed = report.dispatch.printed,
        failed = report.dispatch.failed,
        moved = report.moved,
        marked_seen = report.marked_seen,
        "Done"
    );

    if let Err(err) = session.logout().await {
        warn!(error = %err, "Logout failed");
    }
    Ok(())
}

/// Default log filter for a verbosity level. `RUST_LOG` overrides it.
fn log_filter(level: u8) -> &'static str {
    match level {
        0 => "mailprint=info,mailprint_core=info,mailprint_imap=warn",
        1 => "mailprint=debug,mailprint_core=debug,mailprint_imap=debug",
        _ => {
            "mailprint=debug,mailprint_core=debug,mailprint_imap=debug,mailprint_imap::wire=trace"
        }
    }
}
