use crate::database::TableName;
use crate::error::AppError;
use crate::sync::SyncWorker;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Recent sync failures, oldest evicted first.
pub struct ErrorLog {
    errors: Mutex<VecDeque<ErrorEntry>>,
    max_entries: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEntry {
    pub timestamp: String,
    pub source: String,
    pub error: String,
    pub context: Option<String>,
}

impl ErrorLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            errors: Mutex::new(VecDeque::new()),
            max_entries: max_entries.max(1),
        }
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<ErrorEntry>> {
        self.errors.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn log_error(&self, source: &str, error: &str, context: Option<&str>) {
        let entry = ErrorEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            source: source.to_string(),
            error: error.to_string(),
            context: context.map(|s| s.to_string()),
        };

        log::error!("{}: {}", source, error);

        let mut errors = self.entries();
        if errors.len() >= self.max_entries {
            errors.pop_front();
        }
        errors.push_back(entry);
    }

    pub fn get_errors(&self) -> Vec<ErrorEntry> {
        self.entries().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }
}

#[derive(Debug, Serialize)]
pub struct TableCount {
    pub table: TableName,
    pub rows: i64,
}

#[derive(Debug, Serialize)]
pub struct DiagnosticsReport {
    pub app_version: String,
    pub tables: Vec<TableCount>,
    pub recent_errors: Vec<ErrorEntry>,
}

/// Row counts per table plus the error log
pub fn get_diagnostics(worker: &SyncWorker) -> Result<DiagnosticsReport, AppError> {
    let db = worker.database();
    let tables = TableName::ALL
        .iter()
        .map(|&table| -> Result<TableCount, AppError> {
            Ok(TableCount {
                table,
                rows: db.count(table)?,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(DiagnosticsReport {
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        tables,
        recent_errors: worker.error_log().get_errors(),
    })
}

pub fn get_errors(worker: &SyncWorker) -> Vec<ErrorEntry> {
    worker.error_log().get_errors()
}

pub fn clear_errors(worker: &SyncWorker) -> Result<(), AppError> {
    worker.error_log().clear();
    log::info!("Error log cleared");
    Ok(())
}
