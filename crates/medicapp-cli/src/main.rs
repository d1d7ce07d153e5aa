//! MedicApp CLI - a command-line front end for the clinic administration API.
//!
//! Every dashboard command goes through the same route guard the web screens
//! use, and every API call goes through the authenticated client, so an
//! expired session is refreshed or ended exactly as it would be in a browser.

mod cli;
mod commands;

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use medicapp_core::auth::FileSessionStore;
use medicapp_core::{ApiClient, Config, NavigationLog, Session};

use cli::Cli;
use commands::App;

/// Log file name prefix inside the configured log directory
const LOG_FILE_PREFIX: &str = "medicapp.log";

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::load()?;
    let _log_guard = init_tracing(config.log_dir.as_deref());

    let cache_dir = config.cache_dir()?;
    let store = FileSessionStore::open(&cache_dir)
        .with_context(|| format!("Failed to open session in {}", cache_dir.display()))?;
    let session = Session::new(Arc::new(store));

    let navigation = Arc::new(NavigationLog::new());
    let api = ApiClient::from_config(&config, session, navigation.clone())?;
    info!(base_url = %api.base_url(), "MedicApp CLI starting");

    let mut app = App::new(config, api, navigation);
    app.run(cli.command).await
}
