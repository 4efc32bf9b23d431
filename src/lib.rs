pub mod commands;
pub mod config;
pub mod console;
pub mod database;
pub mod error;
pub mod sheets;
pub mod sync;

use commands::ErrorLog;
use config::{AppConfig, Secrets};
use database::Database;
use error::AppError;
use sheets::SheetsClient;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sync::notify::ChangeNotifier;
use sync::{SyncSettings, SyncWorker};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Install the tracing subscriber. `RUST_LOG` overrides the default `info`
/// filter; `log` records are forwarded into it.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_err()
    {
        log::debug!("Logging already initialized");
    }
}

/// Start the sync worker and the stdin console, and run until `quit` or
/// Ctrl-C. The config path is the first CLI argument, else the default.
pub async fn run() -> Result<(), AppError> {
    init_logging();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(config::default_config_path);
    let config = AppConfig::load(&config_path)?;

    let secrets_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let secrets = Secrets::load(&secrets_dir);

    let spreadsheet_id = if config.spreadsheet_id.is_empty() {
        secrets
            .spreadsheet_id
            .clone()
            .ok_or_else(|| AppError::Config("no spreadsheet id: set SHEET_ID".to_string()))?
    } else {
        config.spreadsheet_id.clone()
    };
    let auth = secrets.auth.clone().ok_or_else(|| {
        AppError::Config("set SHEETS_ACCESS_TOKEN or SHEETS_API_KEY".to_string())
    })?;

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Database::new(&config.database_path)?;
    log::info!("Database opened at {}", config.database_path.display());

    let client = SheetsClient::new(
        &config.api_base_url,
        &spreadsheet_id,
        config.sheet_grid_id,
        auth,
        config.request_timeout(),
    )?
    .with_auth_reload({
        let dir = secrets_dir.clone();
        move || Secrets::reload_auth(&dir)
    });

    let worker = Arc::new(SyncWorker::new(
        Arc::new(db),
        Arc::new(client),
        ChangeNotifier::new(config.notify_capacity),
        Arc::new(ErrorLog::new(config.error_log_capacity)),
        SyncSettings::from(&config),
    ));

    let cancel = CancellationToken::new();

    let sync_task = {
        let worker = worker.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { worker.run(cancel).await })
    };
    let console_task = {
        let worker = worker.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { console::run(&worker, cancel).await })
    };

    log::info!("watchlist-sync running, type `help` for commands");

    tokio::select! {
        _ = cancel.cancelled() => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                log::warn!("Failed to listen for Ctrl-C: {}", e);
            }
            log::info!("Interrupted, shutting down");
            cancel.cancel();
        }
    }

    if let Err(e) = sync_task.await {
        log::error!("Sync task ended abnormally: {}", e);
    }
    // A blocked stdin read never completes
    console_task.abort();

    log::info!("watchlist-sync stopped");
    Ok(())
}

/// Load a value from the .env file by key name
pub fn load_env_value(project_dir: &Path, key: &str) -> Option<String> {
    let env_path = project_dir.join(".env");
    let prefix = format!("{}=", key);
    let content = std::fs::read_to_string(env_path).ok()?;
    content.lines().find_map(|line| {
        let value = line
            .trim()
            .strip_prefix(&prefix)?
            .trim()
            .trim_matches('"')
            .trim_matches('\'');
        (!value.is_empty()).then(|| value.to_string())
    })
}
