//! Spreadsheet access.
//!
//! The sync engine only talks to [`DocumentSource`]; [`client::SheetsClient`]
//! is the Google Sheets v4 implementation used by the binary.

pub mod client;
pub mod range;

#[cfg(test)]
pub mod fake;

use crate::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use client::{SheetsAuth, SheetsClient};
pub use range::GridRange;

/// Raw row of cell values as returned by a values read. Cells are nullable
/// primitives (string, number, bool) and trailing empty cells are omitted.
pub type ValueRow = Vec<serde_json::Value>;

/// Background colour of a cell, channels in `[0, 1]`.
///
/// The API omits channels that are zero, so each one is optional and a
/// colour with no channels at all means "no colour".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Color {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub red: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub green: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blue: Option<f64>,
}

impl Color {
    pub fn rgb(red: f64, green: f64, blue: f64) -> Self {
        Self {
            red: Some(red),
            green: Some(green),
            blue: Some(blue),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.red.is_none() && self.green.is_none() && self.blue.is_none()
    }

    /// Channels with missing components read as 0.0
    pub fn channels(&self) -> (f64, f64, f64) {
        (
            self.red.unwrap_or(0.0),
            self.green.unwrap_or(0.0),
            self.blue.unwrap_or(0.0),
        )
    }
}

/// One cell of a grid read: its displayed text and background colour.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridCell {
    pub formatted_value: Option<String>,
    pub background: Option<Color>,
}

impl GridCell {
    /// Displayed text, `None` when the cell is blank
    pub fn text(&self) -> Option<&str> {
        self.formatted_value.as_deref().filter(|v| !v.is_empty())
    }
}

/// One cell of a formatted write. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormattedCell {
    pub value: Option<String>,
    pub background: Option<Color>,
}

/// Read/write access to the tracked spreadsheet.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Raw values of an A1 range, row major
    async fn read_values(&self, range: &str) -> Result<Vec<ValueRow>, AppError>;

    /// Displayed values plus background colours of an A1 range, row major
    async fn read_grid(&self, range: &str) -> Result<Vec<Vec<GridCell>>, AppError>;

    /// Write a single value to a single cell
    async fn write_cell(&self, range: &str, value: &str) -> Result<(), AppError>;

    /// Write `values` down one column starting at the top of `range`
    async fn write_column(&self, range: &str, values: &[String]) -> Result<(), AppError>;

    /// Write values and/or background colours to a grid range
    async fn write_formatted(
        &self,
        range: &GridRange,
        rows: &[Vec<FormattedCell>],
    ) -> Result<(), AppError>;
}
