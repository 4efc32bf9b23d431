pub mod commit;
pub mod decode;
pub mod notify;
pub mod reconcile;
pub mod status;

use crate::commands::diagnostics::ErrorLog;
use crate::config::{AppConfig, ListLayout};
use crate::database::{Database, TableName};
use crate::error::AppError;
use crate::sheets::DocumentSource;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use commit::{sync_table, TableOutcome};
use decode::{decode_completed, decode_lists};
use notify::ChangeNotifier;

const LIST_TABLES: [TableName; 5] = [
    TableName::PtwCasual,
    TableName::PtwNonCasual,
    TableName::PtwMovies,
    TableName::PtwRolled,
    TableName::Seasonal,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Active,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleTrigger {
    Tick,
    Flush,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub trigger: CycleTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tables: Vec<TableOutcome>,
}

impl CycleReport {
    pub fn changed_tables(&self) -> Vec<TableName> {
        self.tables
            .iter()
            .filter(|t| t.changed())
            .map(|t| t.table)
            .collect()
    }

    pub fn failed_tables(&self) -> Vec<TableName> {
        self.tables
            .iter()
            .filter(|t| t.error.is_some())
            .map(|t| t.table)
            .collect()
    }
}

/// Scheduler state. Only the control operations on [`SyncWorker`] write it.
#[derive(Debug, Clone)]
pub struct SyncState {
    pub run_state: RunState,
    pub last_refresh: DateTime<Utc>,
    pub cycles_run: u64,
    pub last_cycle: Option<CycleReport>,
}

impl SyncState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            run_state: RunState::Active,
            last_refresh: now,
            cycles_run: 0,
            last_cycle: None,
        }
    }

    /// A tick does work only while active and inside the idle window.
    pub fn should_run(&self, now: DateTime<Utc>, idle_window: ChronoDuration) -> bool {
        self.run_state == RunState::Active && now - self.last_refresh < idle_window
    }
}

/// Where to read from and how often.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub completed_range: String,
    pub lists_range: String,
    pub layout: ListLayout,
    pub tick_interval: Duration,
    pub idle_window: ChronoDuration,
    /// Upper bound on any single document read
    pub fetch_timeout: Duration,
}

impl From<&AppConfig> for SyncSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            completed_range: config.completed_range.clone(),
            lists_range: config.lists_range.clone(),
            layout: config.layout.clone(),
            tick_interval: config.tick_interval(),
            idle_window: config.idle_window(),
            fetch_timeout: config.request_timeout(),
        }
    }
}

/// Owns the run state and runs reconciliation cycles, one at a time.
pub struct SyncWorker {
    db: Arc<Database>,
    source: Arc<dyn DocumentSource>,
    notifier: ChangeNotifier,
    error_log: Arc<ErrorLog>,
    settings: SyncSettings,
    state: RwLock<SyncState>,
    cycle_lock: Mutex<()>,
}

impl SyncWorker {
    pub fn new(
        db: Arc<Database>,
        source: Arc<dyn DocumentSource>,
        notifier: ChangeNotifier,
        error_log: Arc<ErrorLog>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            db,
            source,
            notifier,
            error_log,
            settings,
            state: RwLock::new(SyncState::new(Utc::now())),
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn source(&self) -> &Arc<dyn DocumentSource> {
        &self.source
    }

    pub fn error_log(&self) -> &Arc<ErrorLog> {
        &self.error_log
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub async fn snapshot(&self) -> SyncState {
        self.state.read().await.clone()
    }

    /// True while a cycle holds the cycle lock
    pub fn is_busy(&self) -> bool {
        self.cycle_lock.try_lock().is_err()
    }

    // =========================================================================
    // Control operations
    // =========================================================================

    /// Paused → Active. Returns false when already active.
    pub async fn start(&self) -> bool {
        let mut state = self.state.write().await;
        if state.run_state == RunState::Active {
            return false;
        }
        state.run_state = RunState::Active;
        log::info!("Sync started");
        true
    }

    /// Active → Paused. An in-flight cycle still finishes.
    pub async fn stop(&self) -> bool {
        let mut state = self.state.write().await;
        if state.run_state == RunState::Paused {
            return false;
        }
        state.run_state = RunState::Paused;
        log::info!("Sync stopped");
        true
    }

    /// Heartbeat: restart the idle window from `now`.
    pub async fn refresh(&self) -> DateTime<Utc> {
        self.refresh_at(Utc::now()).await
    }

    pub async fn refresh_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let mut state = self.state.write().await;
        state.last_refresh = now;
        log::debug!("Idle window refreshed");
        now
    }

    /// Run one cycle now, whatever the run state or idle window. Waits for
    /// an in-flight cycle instead of overlapping it.
    pub async fn flush(&self) -> CycleReport {
        let _guard = self.cycle_lock.lock().await;
        log::info!("Flush requested");
        self.run_cycle(CycleTrigger::Flush).await
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Tick on the configured interval until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        log::info!(
            "Sync worker started (every {:?}, idle after {} min)",
            self.settings.tick_interval,
            self.settings.idle_window.num_minutes()
        );

        let mut ticker = tokio::time::interval(self.settings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::info!("Sync worker cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick_at(Utc::now()).await;
                }
            }
        }

        log::info!("Sync worker stopped");
    }

    /// One scheduler tick. Returns the report when a cycle ran.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Option<CycleReport> {
        let should_run = self
            .state
            .read()
            .await
            .should_run(now, self.settings.idle_window);
        if !should_run {
            log::trace!("Tick skipped: paused or idle");
            return None;
        }

        let _guard = match self.cycle_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                log::debug!("Tick skipped: previous cycle still running");
                return None;
            }
        };
        Some(self.run_cycle(CycleTrigger::Tick).await)
    }

    // =========================================================================
    // Cycle
    // =========================================================================

    /// Callers must hold `cycle_lock`.
    async fn run_cycle(&self, trigger: CycleTrigger) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let span = tracing::info_span!("sync_cycle", %cycle_id, ?trigger);
        let started_at = Utc::now();

        let tables = self.sync_all_tables().instrument(span).await;

        let report = CycleReport {
            cycle_id,
            trigger,
            started_at,
            finished_at: Utc::now(),
            tables,
        };

        let mut state = self.state.write().await;
        state.cycles_run += 1;
        state.last_cycle = Some(report.clone());
        report
    }

    async fn sync_all_tables(&self) -> Vec<TableOutcome> {
        let (values, grid) = futures_util::future::join(
            self.bounded(self.source.read_values(&self.settings.completed_range)),
            self.bounded(self.source.read_grid(&self.settings.lists_range)),
        )
        .await;

        let mut outcomes = Vec::with_capacity(TableName::ALL.len());

        match values {
            Ok(rows) => {
                let items = decode_completed(&rows);
                outcomes.push(self.record(
                    TableName::Completed,
                    sync_table(&self.db, &self.notifier, TableName::Completed, &items),
                ));
            }
            Err(e) => outcomes.push(self.fetch_failed(TableName::Completed, &e)),
        }

        match grid {
            Ok(grid) => {
                let lists = decode_lists(&grid, &self.settings.layout);
                let db = &self.db;
                let n = &self.notifier;
                outcomes.push(self.record(
                    TableName::PtwCasual,
                    sync_table(db, n, TableName::PtwCasual, &lists.casual),
                ));
                outcomes.push(self.record(
                    TableName::PtwNonCasual,
                    sync_table(db, n, TableName::PtwNonCasual, &lists.non_casual),
                ));
                outcomes.push(self.record(
                    TableName::PtwMovies,
                    sync_table(db, n, TableName::PtwMovies, &lists.movies),
                ));
                outcomes.push(self.record(
                    TableName::PtwRolled,
                    sync_table(db, n, TableName::PtwRolled, &lists.rolled),
                ));
                outcomes.push(self.record(
                    TableName::Seasonal,
                    sync_table(db, n, TableName::Seasonal, &lists.seasonal),
                ));
            }
            Err(e) => {
                for table in LIST_TABLES {
                    outcomes.push(self.fetch_failed(table, &e));
                }
            }
        }

        outcomes
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, AppError>>,
    ) -> Result<T, AppError> {
        match tokio::time::timeout(self.settings.fetch_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Sheets(format!(
                "read timed out after {:?}",
                self.settings.fetch_timeout
            ))),
        }
    }

    fn record(&self, table: TableName, result: anyhow::Result<TableOutcome>) -> TableOutcome {
        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = format!("{:#}", e);
                self.error_log
                    .log_error(&format!("sync:{}", table), &message, Some("commit"));
                TableOutcome::failed(table, message)
            }
        }
    }

    fn fetch_failed(&self, table: TableName, error: &AppError) -> TableOutcome {
        let message = error.to_string();
        self.error_log
            .log_error(&format!("sync:{}", table), &message, Some("fetch"));
        TableOutcome::failed(table, message)
    }
}
