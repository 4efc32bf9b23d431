use crate::database::{
    CompletedItem, Database, PlanToWatchEntry, RolledEntry, SeasonalEntry, TableName, TableRecord,
};
use crate::error::AppError;
use serde::Serialize;
use serde_json::Value;

/// Persisted rows of one table as JSON. Completed comes back newest first;
/// every other table uses its stored order.
pub fn get_table(db: &Database, table: TableName) -> Result<Value, AppError> {
    match table {
        TableName::Completed => rows_json::<CompletedItem>(db, table, true),
        TableName::PtwCasual | TableName::PtwNonCasual | TableName::PtwMovies => {
            rows_json::<PlanToWatchEntry>(db, table, false)
        }
        TableName::PtwRolled => rows_json::<RolledEntry>(db, table, false),
        TableName::Seasonal => rows_json::<SeasonalEntry>(db, table, false),
    }
}

/// Same as [`get_table`], looked up by name (`"Seasonal"`, `"casual"`, ...).
pub fn get_table_by_name(db: &Database, name: &str) -> Result<Value, AppError> {
    let table: TableName = name.parse().map_err(AppError::NotFound)?;
    get_table(db, table)
}

fn rows_json<T: TableRecord + Serialize>(
    db: &Database,
    table: TableName,
    descending: bool,
) -> Result<Value, AppError> {
    let rows: Vec<T> = db.find_all_ordered(table, descending)?;
    Ok(serde_json::to_value(rows)?)
}
