//! A1 notation → zero-based, half-open grid coordinates.

use crate::error::AppError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRange {
    pub start_row_index: usize,
    pub end_row_index: usize,
    pub start_column_index: usize,
    pub end_column_index: usize,
}

impl GridRange {
    /// Parse `A1`, `N2:N21` or `Sheet1!O2:P5`. The sheet prefix is ignored;
    /// the grid id is supplied by the client.
    pub fn parse(a1: &str) -> Result<Self, AppError> {
        let cells = match a1.rsplit_once('!') {
            Some((_, cells)) => cells,
            None => a1,
        };

        let (start, end) = match cells.split_once(':') {
            Some((start, end)) => (start, end),
            None => (cells, cells),
        };

        let (start_col, start_row) = parse_cell(start)
            .ok_or_else(|| AppError::Sheets(format!("Invalid range provided: {}", a1)))?;
        let (end_col, end_row) = parse_cell(end)
            .ok_or_else(|| AppError::Sheets(format!("Invalid range provided: {}", a1)))?;

        if end_col < start_col || end_row < start_row {
            return Err(AppError::Sheets(format!("Range is inverted: {}", a1)));
        }

        Ok(Self {
            start_row_index: start_row,
            end_row_index: end_row + 1,
            start_column_index: start_col,
            end_column_index: end_col + 1,
        })
    }

    /// Number of cells, `None` on overflow
    pub fn cells(&self) -> Option<usize> {
        self.rows().checked_mul(self.columns())
    }

    pub fn rows(&self) -> usize {
        self.end_row_index - self.start_row_index
    }

    pub fn columns(&self) -> usize {
        self.end_column_index - self.start_column_index
    }
}

/// `"AB12"` → `(27, 11)`
fn parse_cell(cell: &str) -> Option<(usize, usize)> {
    let cell = cell.trim().replace('$', "");
    let split = cell.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let column = letters
        .chars()
        .map(|c| c.to_ascii_uppercase() as usize - 'A' as usize + 1)
        .try_fold(0usize, |acc, n| acc.checked_mul(26)?.checked_add(n))?
        - 1;
    let row: usize = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((column, row - 1))
}
