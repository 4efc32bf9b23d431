use crate::database::Status;
use crate::error::AppError;
use crate::sheets::{DocumentSource, FormattedCell, GridRange};
use crate::sync::status::reference_color;

/// Most cells a single column or status write may touch
pub const MAX_WRITE_CELLS: usize = 10_000;

pub async fn update_cell(
    source: &dyn DocumentSource,
    range: &str,
    value: &str,
) -> Result<(), AppError> {
    source.write_cell(range, value).await?;
    log::info!("Wrote {}", range);
    Ok(())
}

/// Fill `length` cells down the column starting at `range` with `value`.
pub async fn update_column(
    source: &dyn DocumentSource,
    range: &str,
    value: &str,
    length: usize,
) -> Result<(), AppError> {
    if length == 0 || length > MAX_WRITE_CELLS {
        return Err(AppError::Other(format!(
            "column length must be between 1 and {}",
            MAX_WRITE_CELLS
        )));
    }
    let values = vec![value.to_string(); length];
    source.write_column(range, &values).await?;
    log::info!("Wrote {} cells down {}", length, range);
    Ok(())
}

/// Paint every cell of `range` with the reference colour of `status`.
/// `Unknown` clears the cells to white.
pub async fn update_status(
    source: &dyn DocumentSource,
    range: &str,
    status: Status,
) -> Result<(), AppError> {
    let grid = GridRange::parse(range)?;
    match grid.cells() {
        Some(n) if n <= MAX_WRITE_CELLS => {}
        _ => {
            return Err(AppError::Sheets(format!(
                "Range {} is larger than {} cells",
                range, MAX_WRITE_CELLS
            )))
        }
    }
    let cell = FormattedCell {
        value: None,
        background: Some(reference_color(status)),
    };
    let rows = vec![vec![cell; grid.columns()]; grid.rows()];
    source.write_formatted(&grid, &rows).await?;
    log::info!("Marked {} as {}", range, status);
    Ok(())
}
