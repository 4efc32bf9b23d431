use crate::commands::diagnostics::ErrorEntry;
use crate::error::AppError;
use crate::sync::{CycleReport, RunState, SyncState, SyncWorker};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Acknowledgement for start/stop/refresh. `changed` is false for a no-op.
#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub message: String,
    pub changed: bool,
    pub state: RunState,
    pub last_refresh: DateTime<Utc>,
}

impl ControlResponse {
    fn from_state(message: &str, changed: bool, state: &SyncState) -> Self {
        Self {
            message: message.to_string(),
            changed,
            state: state.run_state,
            last_refresh: state.last_refresh,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TimerStatus {
    pub last_refresh: DateTime<Utc>,
    pub idle_deadline: DateTime<Utc>,
    pub remaining_seconds: i64,
    pub idle: bool,
}

impl TimerStatus {
    fn at(state: &SyncState, worker: &SyncWorker, now: DateTime<Utc>) -> Self {
        let idle_deadline = state.last_refresh + worker.settings().idle_window;
        let remaining_seconds = (idle_deadline - now).num_seconds().max(0);
        Self {
            last_refresh: state.last_refresh,
            idle_deadline,
            remaining_seconds,
            idle: now >= idle_deadline,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncStatus {
    pub state: RunState,
    pub busy: bool,
    pub timer: TimerStatus,
    pub cycles_run: u64,
    pub last_cycle: Option<CycleReport>,
    pub recent_errors: Vec<ErrorEntry>,
}

pub async fn start_sync(worker: &SyncWorker) -> Result<ControlResponse, AppError> {
    let changed = worker.start().await;
    let message = if changed {
        "Sync started"
    } else {
        "Sync already started"
    };
    Ok(ControlResponse::from_state(
        message,
        changed,
        &worker.snapshot().await,
    ))
}

pub async fn stop_sync(worker: &SyncWorker) -> Result<ControlResponse, AppError> {
    let changed = worker.stop().await;
    let message = if changed {
        "Sync stopped"
    } else {
        "Sync already stopped"
    };
    Ok(ControlResponse::from_state(
        message,
        changed,
        &worker.snapshot().await,
    ))
}

pub async fn refresh_sync(worker: &SyncWorker) -> Result<ControlResponse, AppError> {
    worker.refresh().await;
    Ok(ControlResponse::from_state(
        "Idle timer refreshed",
        true,
        &worker.snapshot().await,
    ))
}

/// Run a cycle now and return its report.
pub async fn flush_sync(worker: &SyncWorker) -> Result<CycleReport, AppError> {
    Ok(worker.flush().await)
}

pub async fn get_timer(worker: &SyncWorker) -> Result<TimerStatus, AppError> {
    let state = worker.snapshot().await;
    Ok(TimerStatus::at(&state, worker, Utc::now()))
}

pub async fn get_sync_status(worker: &SyncWorker) -> Result<SyncStatus, AppError> {
    let state = worker.snapshot().await;
    let timer = TimerStatus::at(&state, worker, Utc::now());
    Ok(SyncStatus {
        state: state.run_state,
        busy: worker.is_busy(),
        timer,
        cycles_run: state.cycles_run,
        last_cycle: state.last_cycle,
        recent_errors: worker.error_log().get_errors(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::tests::worker_with;
    use crate::sheets::fake::FakeSheet;
    use std::sync::Arc;

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let (worker, _dir) = worker_with(Arc::new(FakeSheet::new()));

        let r = start_sync(&worker).await.unwrap();
        assert!(!r.changed);
        assert_eq!(r.message, "Sync already started");

        let r = stop_sync(&worker).await.unwrap();
        assert!(r.changed);
        assert_eq!(r.state, RunState::Paused);

        let r = stop_sync(&worker).await.unwrap();
        assert!(!r.changed);
        assert_eq!(r.message, "Sync already stopped");

        let r = start_sync(&worker).await.unwrap();
        assert!(r.changed);
        assert_eq!(r.state, RunState::Active);
    }

    #[tokio::test]
    async fn refresh_moves_the_idle_deadline() {
        let (worker, _dir) = worker_with(Arc::new(FakeSheet::new()));
        let before = get_timer(&worker).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let r = refresh_sync(&worker).await.unwrap();
        let after = get_timer(&worker).await.unwrap();

        assert!(r.last_refresh > before.last_refresh);
        assert!(after.idle_deadline > before.idle_deadline);
        assert!(!after.idle);
        assert!(after.remaining_seconds > 0);
    }

    #[tokio::test]
    async fn status_reports_flush_results() {
        let sheet = Arc::new(FakeSheet::new());
        sheet.fail_values(true);
        let (worker, _dir) = worker_with(sheet);

        let report = flush_sync(&worker).await.unwrap();
        let status = get_sync_status(&worker).await.unwrap();

        assert_eq!(status.cycles_run, 1);
        assert!(!status.busy);
        assert_eq!(status.last_cycle.unwrap().cycle_id, report.cycle_id);
        assert_eq!(status.recent_errors.len(), 1);
    }
}
