//! In-memory [`DocumentSource`] for tests.

use super::{DocumentSource, FormattedCell, GridCell, GridRange, ValueRow};
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    Cell { range: String, value: String },
    Column { range: String, values: Vec<String> },
    Formatted { range: GridRange, rows: Vec<Vec<FormattedCell>> },
}

#[derive(Default)]
pub struct FakeSheet {
    values: Mutex<Vec<ValueRow>>,
    grid: Mutex<Vec<Vec<GridCell>>>,
    writes: Mutex<Vec<Write>>,
    fail_values: AtomicBool,
    fail_grid: AtomicBool,
    read_delay: Mutex<Option<Duration>>,
    reads: AtomicUsize,
}

impl FakeSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_values(&self, rows: Vec<ValueRow>) {
        *self.values.lock().unwrap() = rows;
    }

    pub fn set_grid(&self, grid: Vec<Vec<GridCell>>) {
        *self.grid.lock().unwrap() = grid;
    }

    pub fn fail_values(&self, fail: bool) {
        self.fail_values.store(fail, Ordering::SeqCst);
    }

    pub fn fail_grid(&self, fail: bool) {
        self.fail_grid.store(fail, Ordering::SeqCst);
    }

    pub fn set_read_delay(&self, delay: Option<Duration>) {
        *self.read_delay.lock().unwrap() = delay;
    }

    /// Number of `read_values` calls so far
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    async fn delay(&self) {
        let delay = *self.read_delay.lock().unwrap();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
    }
}

/// A completed-sheet row: id, title, type, episodes, three ratings, start, end, notes.
pub fn completed_row(id: i64, title: &str) -> ValueRow {
    vec![
        Value::from(id.to_string()),
        Value::from(title),
        Value::from("TV"),
        Value::from("12/12"),
        Value::from("8.5"),
        Value::from("7"),
        Value::from(""),
        Value::from("2021-01-03"),
        Value::from("2021-02-10"),
        Value::from(""),
    ]
}

pub fn text_cell(text: &str) -> GridCell {
    GridCell {
        formatted_value: Some(text.to_string()),
        background: None,
    }
}

#[async_trait]
impl DocumentSource for FakeSheet {
    async fn read_values(&self, _range: &str) -> Result<Vec<ValueRow>, AppError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        if self.fail_values.load(Ordering::SeqCst) {
            return Err(AppError::Sheets("values read failed".into()));
        }
        Ok(self.values.lock().unwrap().clone())
    }

    async fn read_grid(&self, _range: &str) -> Result<Vec<Vec<GridCell>>, AppError> {
        self.delay().await;
        if self.fail_grid.load(Ordering::SeqCst) {
            return Err(AppError::Sheets("grid read failed".into()));
        }
        Ok(self.grid.lock().unwrap().clone())
    }

    async fn write_cell(&self, range: &str, value: &str) -> Result<(), AppError> {
        self.writes.lock().unwrap().push(Write::Cell {
            range: range.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    async fn write_column(&self, range: &str, values: &[String]) -> Result<(), AppError> {
        self.writes.lock().unwrap().push(Write::Column {
            range: range.to_string(),
            values: values.to_vec(),
        });
        Ok(())
    }

    async fn write_formatted(
        &self,
        range: &GridRange,
        rows: &[Vec<FormattedCell>],
    ) -> Result<(), AppError> {
        self.writes.lock().unwrap().push(Write::Formatted {
            range: *range,
            rows: rows.to_vec(),
        });
        Ok(())
    }
}
