//! Diff a freshly decoded table against its persisted copy.
//!
//! Pure over in-memory records: no store, no network. Records are compared
//! with full structural equality, so both sides must already be in the same
//! representation (see `database::TableRecord` for how timestamps and tags
//! are normalized on load).

use crate::database::{CompletedItem, PlanToWatchEntry, RolledEntry, SeasonalEntry};
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

/// The rule that matches a sheet record to a stored one.
pub trait Identity: Clone + PartialEq {
    type Key: Clone + Eq + Hash + Debug;

    fn identity(&self) -> Self::Key;
}

impl Identity for CompletedItem {
    type Key = i64;

    fn identity(&self) -> i64 {
        self.id
    }
}

/// Positional: the row offset inside the list region.
impl Identity for PlanToWatchEntry {
    type Key = i64;

    fn identity(&self) -> i64 {
        self.id
    }
}

impl Identity for RolledEntry {
    type Key = i64;

    fn identity(&self) -> i64 {
        self.id
    }
}

/// By title; `order` takes part in change detection but not in identity.
impl Identity for SeasonalEntry {
    type Key = String;

    fn identity(&self) -> String {
        self.title.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation<T: Identity> {
    /// New or changed sheet records, in sheet order
    pub upserts: Vec<T>,
    /// Stored identities no longer present in the sheet
    pub deletes: Vec<T::Key>,
    /// Sheet records that already match the store exactly
    pub unchanged: usize,
}

impl<T: Identity> Reconciliation<T> {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }
}

/// Compute what to write so `target` matches `source`.
///
/// Candidates are the identities of every record in the symmetric
/// difference of the two collections; each candidate present in `source`
/// becomes an upsert. Deletions are only looked for when the stored table is
/// longer than the sheet, so a same-size edit that removes one row and adds
/// another never deletes the removed row.
pub fn reconcile<T: Identity>(source: &[T], target: &[T]) -> Reconciliation<T> {
    let mut target_by_key: HashMap<T::Key, Vec<&T>> = HashMap::new();
    for record in target {
        target_by_key.entry(record.identity()).or_default().push(record);
    }
    let mut source_by_key: HashMap<T::Key, Vec<&T>> = HashMap::new();
    for record in source {
        source_by_key.entry(record.identity()).or_default().push(record);
    }

    let mut candidates: HashSet<T::Key> = HashSet::new();
    let mut unchanged = 0;
    for record in source {
        let key = record.identity();
        let matched = target_by_key
            .get(&key)
            .map(|stored| stored.iter().any(|t| *t == record))
            .unwrap_or(false);
        if matched {
            unchanged += 1;
        } else {
            candidates.insert(key);
        }
    }
    for record in target {
        let key = record.identity();
        let matched = source_by_key
            .get(&key)
            .map(|fresh| fresh.iter().any(|s| *s == record))
            .unwrap_or(false);
        if !matched {
            candidates.insert(key);
        }
    }

    let upserts: Vec<T> = source
        .iter()
        .filter(|record| candidates.contains(&record.identity()))
        .cloned()
        .collect();

    let mut deletes = Vec::new();
    if target.len() > source.len() {
        let mut seen = HashSet::new();
        for record in target {
            let key = record.identity();
            if !source_by_key.contains_key(&key) && seen.insert(key.clone()) {
                deletes.push(key);
            }
        }
    }

    Reconciliation {
        upserts,
        deletes,
        unchanged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Status;

    fn ptw(id: i64, title: &str) -> PlanToWatchEntry {
        PlanToWatchEntry {
            id,
            title: title.to_string(),
        }
    }

    fn seasonal(title: &str, status: Status, order: i64) -> SeasonalEntry {
        SeasonalEntry {
            title: title.to_string(),
            status,
            order,
        }
    }

    #[test]
    fn new_record_is_upserted() {
        let r = reconcile(&[ptw(1, "A")], &[]);
        assert_eq!(r.upserts, vec![ptw(1, "A")]);
        assert!(r.deletes.is_empty());
    }

    #[test]
    fn missing_record_is_deleted() {
        let r = reconcile(&[], &[ptw(1, "A")]);
        assert!(r.upserts.is_empty());
        assert_eq!(r.deletes, vec![1]);
    }

    #[test]
    fn changed_record_same_length_is_upsert_only() {
        let r = reconcile(&[ptw(1, "A")], &[ptw(1, "B")]);
        assert_eq!(r.upserts, vec![ptw(1, "A")]);
        assert!(r.deletes.is_empty());
    }

    #[test]
    fn identical_collections_are_a_no_op() {
        let rows = vec![ptw(0, "A"), ptw(1, "B"), ptw(2, "C")];
        let r = reconcile(&rows, &rows);
        assert!(r.is_empty());
        assert_eq!(r.unchanged, 3);
    }

    #[test]
    fn shrinking_table_deletes_and_updates() {
        let source = vec![ptw(0, "A"), ptw(1, "C")];
        let target = vec![ptw(0, "A"), ptw(1, "B"), ptw(2, "C")];
        let r = reconcile(&source, &target);
        assert_eq!(r.upserts, vec![ptw(1, "C")]);
        assert_eq!(r.deletes, vec![2]);
        assert_eq!(r.unchanged, 1);
    }

    /// Known gap: one row removed and a different one added in the same
    /// cycle keeps the table length, so the removed row is never deleted.
    #[test]
    fn same_length_swap_does_not_delete() {
        let source = vec![ptw(0, "A"), ptw(5, "New")];
        let target = vec![ptw(0, "A"), ptw(3, "Gone")];
        let r = reconcile(&source, &target);
        assert_eq!(r.upserts, vec![ptw(5, "New")]);
        assert!(r.deletes.is_empty());
    }

    #[test]
    fn seasonal_reorder_is_update_not_delete() {
        let source = vec![
            seasonal("B", Status::Loaded, 0),
            seasonal("A", Status::Watched, 1),
        ];
        let target = vec![
            seasonal("A", Status::Watched, 0),
            seasonal("B", Status::Loaded, 1),
        ];
        let r = reconcile(&source, &target);
        assert_eq!(r.upserts.len(), 2);
        assert!(r.deletes.is_empty());
    }

    #[test]
    fn seasonal_delete_ignores_order() {
        // "A" moved rows and "C" disappeared: only "C" is deleted
        let source = vec![seasonal("A", Status::Watched, 1)];
        let target = vec![
            seasonal("A", Status::Watched, 0),
            seasonal("C", Status::NotAired, 1),
        ];
        let r = reconcile(&source, &target);
        assert_eq!(r.deletes, vec!["C".to_string()]);
        assert_eq!(r.upserts, vec![seasonal("A", Status::Watched, 1)]);
    }

    #[test]
    fn positional_identity_turns_reorder_into_updates() {
        let source = vec![ptw(0, "B"), ptw(1, "A")];
        let target = vec![ptw(0, "A"), ptw(1, "B")];
        let r = reconcile(&source, &target);
        assert_eq!(r.upserts, source);
        assert!(r.deletes.is_empty());
    }

    #[test]
    fn rolled_status_change_is_detected() {
        let source = vec![RolledEntry {
            id: 0,
            title: "X".into(),
            status: Status::Watched,
        }];
        let target = vec![RolledEntry {
            id: 0,
            title: "X".into(),
            status: Status::Loaded,
        }];
        let r = reconcile(&source, &target);
        assert_eq!(r.upserts, source);
    }
}
