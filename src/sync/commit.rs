//! Apply a [`Reconciliation`] to the store and announce it.

use crate::database::{Database, TableName, TableRecord};
use crate::sync::notify::{ChangeKind, ChangeNotifier};
use crate::sync::reconcile::{reconcile, Identity, Reconciliation};
use anyhow::{Context, Result};
use serde::Serialize;

/// What one table's sync did during a cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableOutcome {
    pub table: TableName,
    pub upserted: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub error: Option<String>,
}

impl TableOutcome {
    pub fn failed(table: TableName, error: String) -> Self {
        Self {
            table,
            upserted: 0,
            deleted: 0,
            unchanged: 0,
            error: Some(error),
        }
    }

    pub fn changed(&self) -> bool {
        self.upserted > 0 || self.deleted > 0
    }
}

/// Deletes first, then upserts, in one transaction. Emits exactly one change
/// event when anything was written; an empty plan touches nothing.
pub fn commit<T>(
    db: &Database,
    notifier: &ChangeNotifier,
    table: TableName,
    plan: &Reconciliation<T>,
) -> Result<()>
where
    T: Identity + TableRecord<Key = <T as Identity>::Key>,
{
    if plan.is_empty() {
        return Ok(());
    }

    db.apply_changes(table, &plan.deletes, &plan.upserts)
        .with_context(|| format!("committing {}", table))?;

    log::info!(
        "{}: {} upserted, {} deleted",
        table,
        plan.upserts.len(),
        plan.deletes.len()
    );
    notifier.notify(table, ChangeKind::Change);
    Ok(())
}

/// Load the stored copy of `table`, diff it against `source` and commit.
pub fn sync_table<T>(
    db: &Database,
    notifier: &ChangeNotifier,
    table: TableName,
    source: &[T],
) -> Result<TableOutcome>
where
    T: Identity + TableRecord<Key = <T as Identity>::Key>,
{
    let target: Vec<T> = db
        .find_all(table)
        .with_context(|| format!("loading {}", table))?;
    let plan = reconcile(source, &target);
    commit(db, notifier, table, &plan)?;

    Ok(TableOutcome {
        table,
        upserted: plan.upserts.len(),
        deleted: plan.deletes.len(),
        unchanged: plan.unchanged,
        error: None,
    })
}
