//! qmail-auth - command-line client for the Q-Mail auth backend.
//!
//! Signs in and out, restores and refreshes the stored session, and drives
//! the Google and password-reset flows from a terminal.

mod commands;

use std::io;
use std::path::Path;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use qmail_auth_core::{storage, ApiClient, AuthorizedClient, Config, RouteGuard, SessionStore};

use commands::{Command, TerminalNavigator};

/// Set to `1` to also write logs to a daily file in the storage directory
const ENV_LOG_FILE: &str = "QMAIL_AUTH_LOG_FILE";

/// Log file prefix inside the storage directory
const LOG_FILE_PREFIX: &str = "qmail-auth.log";

/// Initialize the tracing subscriber for logging.
/// The returned guard flushes the file writer and must live until exit.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
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

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: failed to load config ({}), using defaults", e);
        Config::default()
    });
    config.apply_env_overrides();

    let storage_dir = config.storage_dir()?;
    let log_to_file = std::env::var(ENV_LOG_FILE).map(|v| v == "1").unwrap_or(false);
    let log_guard = init_tracing(log_to_file.then_some(storage_dir.as_path()));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, commands::USAGE);
            std::process::exit(2);
        }
    };
    if matches!(command, Command::Help) {
        println!("{}", commands::USAGE);
        return Ok(());
    }

    info!(api = %config.api_base_url, storage = ?config.storage, "qmail-auth starting");

    let api = ApiClient::from_config(&config)?;
    let store = SessionStore::new(
        api.clone(),
        storage::open(config.storage, storage_dir),
        Box::new(TerminalNavigator),
    );
    let client = AuthorizedClient::new(store.clone(), api);
    let guard = RouteGuard::new(store.clone());

    let result = commands::run(command, &mut config, &store, &client, &guard).await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        drop(log_guard);
        std::process::exit(1);
    }
    Ok(())
}
