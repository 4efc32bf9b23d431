pub mod models;


use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params_from_iter, Connection, Row, ToSql};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

pub use models::*;

/// SQLite caps bound parameters per statement; deletes are chunked below it.
const DELETE_CHUNK: usize = 500;

/// A record type that can be persisted in one of the mirrored tables.
///
/// `COLUMNS` and `bind` must agree in order; `KEY_COLUMN` is the identity
/// used for upsert conflicts and deletes.
pub trait TableRecord: Sized {
    type Key: ToSql;

    const COLUMNS: &'static [&'static str];
    const KEY_COLUMN: &'static str;

    fn bind(&self) -> Result<Vec<Value>>;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        // Enable WAL mode for concurrent reads
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA cache_size=10000;
            PRAGMA temp_store=MEMORY;
        ",
        )?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.init_schema()?;

        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection mutex poisoned"))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS completed (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                kind TEXT NOT NULL,
                type_tags TEXT NOT NULL DEFAULT '[]', -- JSON array
                episode TEXT NOT NULL,
                episode_actual INTEGER NOT NULL,
                episode_total INTEGER NOT NULL,
                rating1 TEXT NOT NULL,
                rating2 TEXT NOT NULL,
                rating3 TEXT NOT NULL,
                rating1_average REAL NOT NULL,
                rating2_average REAL NOT NULL,
                rating3_average REAL NOT NULL,
                start_date TEXT NOT NULL,
                start_at INTEGER, -- epoch millis, NULL when unparseable
                end_date TEXT NOT NULL,
                end_at INTEGER,
                notes TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ptw_casual (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ptw_non_casual (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ptw_movies (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ptw_rolled (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                status TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS seasonal (
                title TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                sort_order INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_seasonal_order ON seasonal(sort_order);
            "#,
        )?;
        Ok(())
    }

    // =========================================================================
    // Mirrored tables
    // =========================================================================

    /// All rows of `table`, ascending by its declared sort column
    pub fn find_all<T: TableRecord>(&self, table: TableName) -> Result<Vec<T>> {
        self.find_all_ordered(table, false)
    }

    pub fn find_all_ordered<T: TableRecord>(
        &self,
        table: TableName,
        descending: bool,
    ) -> Result<Vec<T>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {} {}",
            T::COLUMNS.join(", "),
            table.sql_table(),
            table.sort_column(),
            if descending { "DESC" } else { "ASC" }
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| T::from_row(row))?
            .collect::<rusqlite::Result<Vec<T>>>()?;
        Ok(rows)
    }

    /// Delete `deletes` then upsert `upserts`, all inside one transaction.
    ///
    /// Either every statement lands or none does.
    pub fn apply_changes<T: TableRecord>(
        &self,
        table: TableName,
        deletes: &[T::Key],
        upserts: &[T],
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        for chunk in deletes.chunks(DELETE_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "DELETE FROM {} WHERE {} IN ({})",
                table.sql_table(),
                T::KEY_COLUMN,
                placeholders
            );
            tx.execute(&sql, params_from_iter(chunk.iter()))?;
        }

        if !upserts.is_empty() {
            let sql = upsert_sql::<T>(table);
            let mut stmt = tx.prepare(&sql)?;
            for record in upserts {
                let values = record.bind()?;
                stmt.execute(params_from_iter(values.iter()))?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    pub fn count(&self, table: TableName) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table.sql_table()),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn upsert_sql<T: TableRecord>(table: TableName) -> String {
    let placeholders = vec!["?"; T::COLUMNS.len()].join(", ");
    let updates = T::COLUMNS
        .iter()
        .filter(|c| **c != T::KEY_COLUMN)
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO UPDATE SET {}",
        table.sql_table(),
        T::COLUMNS.join(", "),
        placeholders,
        T::KEY_COLUMN,
        updates
    )
}

fn millis_to_datetime(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

fn datetime_to_value(dt: &Option<DateTime<Utc>>) -> Value {
    match dt {
        Some(dt) => Value::Integer(dt.timestamp_millis()),
        None => Value::Null,
    }
}

// =============================================================================
// Record mappings
// =============================================================================

impl TableRecord for CompletedItem {
    type Key = i64;

    const COLUMNS: &'static [&'static str] = &[
        "id",
        "title",
        "kind",
        "type_tags",
        "episode",
        "episode_actual",
        "episode_total",
        "rating1",
        "rating2",
        "rating3",
        "rating1_average",
        "rating2_average",
        "rating3_average",
        "start_date",
        "start_at",
        "end_date",
        "end_at",
        "notes",
    ];
    const KEY_COLUMN: &'static str = "id";

    fn bind(&self) -> Result<Vec<Value>> {
        Ok(vec![
            Value::Integer(self.id),
            Value::Text(self.title.clone()),
            Value::Text(self.kind.clone()),
            Value::Text(serde_json::to_string(&self.type_tags)?),
            Value::Text(self.episode.clone()),
            Value::Integer(self.episode_actual.into()),
            Value::Integer(self.episode_total.into()),
            Value::Text(self.rating1.clone()),
            Value::Text(self.rating2.clone()),
            Value::Text(self.rating3.clone()),
            Value::Real(self.rating1_average),
            Value::Real(self.rating2_average),
            Value::Real(self.rating3_average),
            Value::Text(self.start.clone()),
            datetime_to_value(&self.start_at),
            Value::Text(self.end.clone()),
            datetime_to_value(&self.end_at),
            Value::Text(self.notes.clone()),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let tags_json: String = row.get(3)?;
        let type_tags: Vec<String> = serde_json::from_str(&tags_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
        Ok(CompletedItem {
            id: row.get(0)?,
            title: row.get(1)?,
            kind: row.get(2)?,
            type_tags,
            episode: row.get(4)?,
            episode_actual: row.get(5)?,
            episode_total: row.get(6)?,
            rating1: row.get(7)?,
            rating2: row.get(8)?,
            rating3: row.get(9)?,
            rating1_average: row.get(10)?,
            rating2_average: row.get(11)?,
            rating3_average: row.get(12)?,
            start: row.get(13)?,
            start_at: millis_to_datetime(row.get(14)?),
            end: row.get(15)?,
            end_at: millis_to_datetime(row.get(16)?),
            notes: row.get(17)?,
        })
    }
}

impl TableRecord for PlanToWatchEntry {
    type Key = i64;

    const COLUMNS: &'static [&'static str] = &["id", "title"];
    const KEY_COLUMN: &'static str = "id";

    fn bind(&self) -> Result<Vec<Value>> {
        Ok(vec![Value::Integer(self.id), Value::Text(self.title.clone())])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(PlanToWatchEntry {
            id: row.get(0)?,
            title: row.get(1)?,
        })
    }
}

impl TableRecord for RolledEntry {
    type Key = i64;

    const COLUMNS: &'static [&'static str] = &["id", "title", "status"];
    const KEY_COLUMN: &'static str = "id";

    fn bind(&self) -> Result<Vec<Value>> {
        Ok(vec![
            Value::Integer(self.id),
            Value::Text(self.title.clone()),
            Value::Text(self.status.as_str().to_string()),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RolledEntry {
            id: row.get(0)?,
            title: row.get(1)?,
            status: row.get::<_, String>(2)?.into(),
        })
    }
}

impl TableRecord for SeasonalEntry {
    type Key = String;

    const COLUMNS: &'static [&'static str] = &["title", "status", "sort_order"];
    const KEY_COLUMN: &'static str = "title";

    fn bind(&self) -> Result<Vec<Value>> {
        Ok(vec![
            Value::Text(self.title.clone()),
            Value::Text(self.status.as_str().to_string()),
            Value::Integer(self.order),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(SeasonalEntry {
            title: row.get(0)?,
            status: row.get::<_, String>(1)?.into(),
            order: row.get(2)?,
        })
    }
}
