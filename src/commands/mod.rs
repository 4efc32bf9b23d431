//! Operations exposed to whatever drives the process (the stdin console in
//! the binary). Each returns a serializable value or an [`AppError`].
//!
//! [`AppError`]: crate::error::AppError

pub mod control;
pub mod diagnostics;
pub mod sheet;
pub mod tables;

pub use control::{
    flush_sync, get_sync_status, get_timer, refresh_sync, start_sync, stop_sync, ControlResponse,
    SyncStatus, TimerStatus,
};
pub use diagnostics::{clear_errors, get_diagnostics, get_errors, ErrorEntry, ErrorLog};
pub use sheet::{update_cell, update_column, update_status};
pub use tables::{get_table, get_table_by_name};
