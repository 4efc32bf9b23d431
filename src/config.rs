//! Runtime configuration.
//!
//! Loaded from a YAML file; every field has a default so a partial file (or
//! none at all) works. Secrets come from the environment or a `.env` file and
//! are never part of the YAML.

use crate::error::AppError;
use crate::load_env_value;
use crate::sheets::client::DEFAULT_BASE_URL;
use crate::sheets::SheetsAuth;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One year
pub const MAX_IDLE_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

/// Rows `start..end` of one grid column form a list; the positional id of a
/// row is its offset from `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRegion {
    pub column: usize,
    pub start: usize,
    pub end: usize,
}

impl ListRegion {
    pub const fn new(column: usize, start: usize, end: usize) -> Self {
        Self { column, start, end }
    }

    pub fn rows(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Seasonal titles and their status colours sit in adjacent columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonalRegion {
    pub title_column: usize,
    pub status_column: usize,
    pub start: usize,
    pub end: usize,
}

/// Where each plan-to-watch list lives inside `lists_range`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListLayout {
    pub casual: ListRegion,
    pub non_casual: ListRegion,
    pub movies: ListRegion,
    pub rolled: ListRegion,
    pub seasonal: SeasonalRegion,
}

impl Default for ListLayout {
    fn default() -> Self {
        Self {
            casual: ListRegion::new(0, 0, 15),
            non_casual: ListRegion::new(1, 0, 15),
            movies: ListRegion::new(0, 20, 25),
            rolled: ListRegion::new(2, 0, 21),
            seasonal: SeasonalRegion {
                title_column: 3,
                status_column: 4,
                start: 0,
                end: 21,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    /// Falls back to the `SHEET_ID` secret when empty
    pub spreadsheet_id: String,
    /// Numeric sheet (tab) id used for formatted writes
    pub sheet_grid_id: i64,
    pub api_base_url: String,
    pub completed_range: String,
    pub lists_range: String,
    pub layout: ListLayout,
    pub tick_interval_secs: u64,
    pub idle_window_secs: u64,
    pub request_timeout_secs: u64,
    pub notify_capacity: usize,
    pub error_log_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_data_dir().join("watchlist.db"),
            spreadsheet_id: String::new(),
            sheet_grid_id: 0,
            api_base_url: DEFAULT_BASE_URL.to_string(),
            completed_range: "Sheet1!A2:J999".to_string(),
            lists_range: "L2:R45".to_string(),
            layout: ListLayout::default(),
            tick_interval_secs: 3,
            idle_window_secs: 30 * 60,
            request_timeout_secs: 10,
            notify_capacity: 64,
            error_log_capacity: 100,
        }
    }
}

impl AppConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, AppError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.tick_interval_secs == 0 {
            return Err(AppError::Config("tick_interval_secs must be > 0".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(AppError::Config("request_timeout_secs must be > 0".to_string()));
        }
        if self.idle_window_secs > MAX_IDLE_WINDOW_SECS {
            return Err(AppError::Config(format!(
                "idle_window_secs must be at most {}",
                MAX_IDLE_WINDOW_SECS
            )));
        }
        if self.notify_capacity == 0 {
            return Err(AppError::Config("notify_capacity must be > 0".to_string()));
        }
        let l = &self.layout;
        for (name, start, end) in [
            ("casual", l.casual.start, l.casual.end),
            ("non_casual", l.non_casual.start, l.non_casual.end),
            ("movies", l.movies.start, l.movies.end),
            ("rolled", l.rolled.start, l.rolled.end),
            ("seasonal", l.seasonal.start, l.seasonal.end),
        ] {
            if start > end {
                return Err(AppError::Config(format!(
                    "layout.{} has start {} after end {}",
                    name, start, end
                )));
            }
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn idle_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.idle_window_secs.min(MAX_IDLE_WINDOW_SECS) as i64)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// `<data_dir>/watchlist-sync`, or the working directory when the platform
/// has no data dir.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("watchlist-sync"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `<config_dir>/watchlist-sync/config.yaml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("watchlist-sync"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("config.yaml")
}

/// Credentials for the Sheets API.
#[derive(Debug, Clone)]
pub struct Secrets {
    pub spreadsheet_id: Option<String>,
    pub auth: Option<SheetsAuth>,
}

impl Secrets {
    /// Process environment first, then `<dir>/.env`.
    pub fn load(dir: &Path) -> Self {
        let lookup = |key: &str| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .or_else(|| load_env_value(dir, key))
        };

        let auth = auth_from(lookup);
        match &auth {
            Some(SheetsAuth::Bearer(_)) => log::info!("Sheets access token loaded"),
            Some(SheetsAuth::ApiKey(_)) => log::info!("Sheets API key loaded (read only)"),
            None => log::warn!("No Sheets credentials configured"),
        }

        Self {
            spreadsheet_id: lookup("SHEET_ID"),
            auth,
        }
    }

    /// Re-read credentials after the server rejected the current ones.
    /// `<dir>/.env` is read before the process environment.
    pub fn reload_auth(dir: &Path) -> Option<SheetsAuth> {
        auth_from(|key| {
            load_env_value(dir, key).or_else(|| {
                std::env::var(key)
                    .ok()
                    .filter(|v| !v.trim().is_empty())
            })
        })
    }
}

fn auth_from(lookup: impl Fn(&str) -> Option<String>) -> Option<SheetsAuth> {
    lookup("SHEETS_ACCESS_TOKEN")
        .map(SheetsAuth::Bearer)
        .or_else(|| lookup("SHEETS_API_KEY").map(SheetsAuth::ApiKey))
}
