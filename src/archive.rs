//! The archive facade (spec.md §4.7): the public surface tying schema,
//! row history, snapshot metadata, the merge engine, checkout, and
//! rollback together behind a single-writer/multi-reader lock.

use crate::checkout::{checkout, reader as row_reader};
use crate::config::CreateOptions;
use crate::document::{DocRow, InMemoryDocument};
use crate::error::{HistoryError, Result};
use crate::merge::{merge, MergeOptions};
use crate::row::ArchiveRow;
use crate::rollback::rollback as rollback_rows;
use crate::schema::Schema;
use crate::snapshot::{SnapshotDescriptor, SnapshotListing};
use crate::store::{ArchiveState, Store};
use crate::types::{Scalar, Table, Version};
use chrono::Utc;
use parking_lot::RwLock;

/// Caller-supplied provenance for a commit (spec.md §3 `SnapshotDescriptor`
/// fields left to the caller).
#[derive(Debug, Clone, Default)]
pub struct CommitInfo {
    pub description: Option<String>,
    pub operation: Option<String>,
    pub source: Option<String>,
}

struct Inner {
    schema: Schema,
    rows: Vec<ArchiveRow>,
    snapshots: SnapshotListing,
    next_row_id: u64,
    next_version: Version,
    options: CreateOptions,
}

/// A versioned, nested-merge archive of tabular snapshots.
///
/// All mutation (`commit`, `apply`, `rollback`) takes the write side of an
/// internal `RwLock`; readers (`checkout`, `reader`, `schema_at`,
/// `history_of`) take the read side and can run concurrently with each
/// other but not with a writer, matching the single-writer/multi-reader
/// model of spec.md §5.
pub struct Archive {
    inner: RwLock<Inner>,
    store: RwLock<Box<dyn Store>>,
}

impl Archive {
    /// Create a fresh, empty archive and persist its initial (empty)
    /// state immediately, so a reader opening the same store before any
    /// commit still finds well-formed metadata.
    pub fn create(options: CreateOptions, mut store: Box<dyn Store>) -> Result<Self> {
        let inner = Inner {
            schema: Schema::new(),
            rows: Vec::new(),
            snapshots: SnapshotListing::new(),
            next_row_id: 0,
            next_version: 0,
            options,
        };
        store.save(&state_of(&inner))?;
        Ok(Self { inner: RwLock::new(inner), store: RwLock::new(store) })
    }

    /// Reopen an archive from a store that has already been initialized
    /// by [`Archive::create`] (or a prior session). Returns
    /// `HistoryError::Store` if the store has nothing persisted.
    pub fn open(store: Box<dyn Store>) -> Result<Self> {
        let state = store
            .load()?
            .ok_or_else(|| HistoryError::Store("no archive state found at this location".to_string()))?;

        let mut schema = Schema::new();
        for column in state.columns {
            schema.restore_column(column);
        }
        schema.set_next_col_id(state.next_col_id);

        let inner = Inner {
            schema,
            rows: state.rows,
            snapshots: state.snapshots,
            next_row_id: state.next_row_id,
            next_version: state.next_version,
            options: CreateOptions {
                primary_key: state.primary_key,
                column_match_policy: state.column_match_policy,
                immutable_key: state.immutable_key,
            },
        };
        Ok(Self { inner: RwLock::new(inner), store: RwLock::new(store) })
    }

    /// Derive each row's merge key from the archive's primary key columns
    /// (or its position, for un-keyed archives) and fold the snapshot into
    /// the archive at the next version.
    pub fn commit(&self, columns: Vec<String>, rows: Vec<Vec<Scalar>>, info: CommitInfo) -> Result<Version> {
        let mut inner = self.inner.write();
        let version = inner.next_version;

        let doc_rows = build_doc_rows(&columns, rows, inner.options.primary_key.as_deref())?;
        let doc = if inner.options.is_keyed() {
            InMemoryDocument::new(columns, doc_rows).sorted_by_key()
        } else {
            InMemoryDocument::new(columns, doc_rows)
        };

        let opts = MergeOptions {
            policy: inner.options.column_match_policy,
            keyed: inner.options.is_keyed(),
            immutable_key: inner.options.immutable_key,
        };

        // Merge mutates the schema in place (new columns are allocated as
        // soon as they're seen) and consumes the row vector, so both are
        // backed up here and restored on any failure below — a commit
        // that raises an error must leave the archive exactly as it found
        // it (spec.md §7).
        let schema_backup = inner.schema.clone();
        let rows_backup = inner.rows.clone();
        let next_row_id_backup = inner.next_row_id;

        let rows_taken = std::mem::take(&mut inner.rows);
        let mut next_row_id = inner.next_row_id;
        let merge_result = merge(rows_taken, &doc, &mut inner.schema, &mut next_row_id, version, &opts);

        let merged = match merge_result {
            Ok(merged) => merged,
            Err(e) => {
                inner.schema = schema_backup;
                inner.rows = rows_backup;
                return Err(e);
            }
        };

        inner.rows = merged;
        inner.next_row_id = next_row_id;
        inner.next_version = version + 1;
        inner.snapshots.push(SnapshotDescriptor {
            version,
            committed_at: Utc::now(),
            description: info.description,
            operation: info.operation,
            source: info.source,
        });

        if let Err(e) = self.persist(&inner) {
            inner.schema = schema_backup;
            inner.rows = rows_backup;
            inner.next_row_id = next_row_id_backup;
            inner.next_version = version;
            inner.snapshots.rollback(version - 1);
            return Err(e);
        }
        Ok(version)
    }

    /// Apply a per-row transformation to the current checkout and commit
    /// the result as a new version (spec.md §4.4 "Apply"). `operator`
    /// receives each row's 0-based position and value tuple and returns
    /// `None` to drop the row or `Some(values)` to keep it (possibly
    /// changed). Surviving rows are renumbered densely in the order the
    /// operator emitted them, per the position-renumbering policy
    /// resolved for this archive.
    pub fn apply<F>(&self, operator: F, info: CommitInfo) -> Result<Version>
    where
        F: Fn(i64, Vec<Scalar>) -> Option<Vec<Scalar>>,
    {
        let current_version = {
            let inner = self.inner.read();
            inner.next_version - 1
        };
        if current_version < 0 {
            return Err(HistoryError::Version(current_version));
        }
        let table = self.checkout(current_version)?;

        let mut rows = Vec::new();
        for (position, row) in table.rows.into_iter().enumerate() {
            if let Some(transformed) = operator(position as i64, row) {
                rows.push(transformed);
            }
        }
        self.commit(table.columns, rows, info)
    }

    /// Reconstruct the table live at version `v`.
    pub fn checkout(&self, v: Version) -> Result<Table> {
        let inner = self.inner.read();
        if inner.snapshots.by_version(v).is_none() {
            return Err(HistoryError::Version(v));
        }
        checkout(&inner.schema, &inner.rows, v)
    }

    /// The schema's live columns (id, name) at version `v`.
    pub fn schema_at(&self, v: Version) -> Vec<(crate::schema::ColId, String)> {
        self.inner.read().schema.columns_at(v)
    }

    /// Every timestamped cell value ever recorded for `row_id`, or `None`
    /// if no such row exists.
    pub fn history_of(&self, row_id: crate::row::RowId) -> Option<ArchiveRow> {
        self.inner.read().rows.iter().find(|r| r.row_id == row_id).cloned()
    }

    /// Raw, unordered access to every archive row (spec.md §4.5 `reader`).
    pub fn reader(&self) -> Vec<ArchiveRow> {
        row_reader(&self.inner.read().rows).cloned().collect()
    }

    pub fn snapshots(&self) -> SnapshotListing {
        self.inner.read().snapshots.clone()
    }

    pub fn current_version(&self) -> Version {
        self.inner.read().next_version - 1
    }

    /// Truncate the archive to retain only versions `<= v`, dropping
    /// every snapshot, row, and column born after it. `v = -1` clears the
    /// archive entirely.
    pub fn rollback(&self, v: Version) -> Result<()> {
        let mut inner = self.inner.write();
        let schema_backup = inner.schema.clone();
        let rows_backup = inner.rows.clone();
        let snapshots_backup = inner.snapshots.clone();
        let next_version_backup = inner.next_version;

        rollback_rows(&mut inner.schema, &mut inner.rows, &mut inner.snapshots, v);
        inner.next_version = v + 1;

        if let Err(e) = self.persist(&inner) {
            inner.schema = schema_backup;
            inner.rows = rows_backup;
            inner.snapshots = snapshots_backup;
            inner.next_version = next_version_backup;
            return Err(e);
        }
        Ok(())
    }

    fn persist(&self, inner: &Inner) -> Result<()> {
        self.store.write().save(&state_of(inner))
    }
}

fn state_of(inner: &Inner) -> ArchiveState {
    ArchiveState {
        columns: inner.schema.columns().to_vec(),
        rows: inner.rows.clone(),
        snapshots: inner.snapshots.clone(),
        next_row_id: inner.next_row_id,
        next_col_id: inner.schema.next_col_id(),
        next_version: inner.next_version,
        primary_key: inner.options.primary_key.clone(),
        immutable_key: inner.options.immutable_key,
        column_match_policy: inner.options.column_match_policy,
    }
}

fn build_doc_rows(columns: &[String], rows: Vec<Vec<Scalar>>, primary_key: Option<&[String]>) -> Result<Vec<DocRow>> {
    let key_positions: Option<Vec<usize>> = match primary_key {
        Some(names) => Some(
            names
                .iter()
                .map(|name| {
                    columns
                        .iter()
                        .position(|c| c == name)
                        .ok_or_else(|| HistoryError::Schema(format!("primary key column '{name}' not found in snapshot")))
                })
                .collect::<Result<Vec<_>>>()?,
        ),
        None => None,
    };

    rows.into_iter()
        .enumerate()
        .map(|(position, values)| {
            if values.len() != columns.len() {
                return Err(HistoryError::Schema(format!(
                    "row at position {position} has {} values but the snapshot declares {} columns",
                    values.len(),
                    columns.len()
                )));
            }
            let key = match &key_positions {
                Some(positions) => positions.iter().map(|&i| values[i].clone()).collect(),
                None => vec![Scalar::Integer(position as i64)],
            };
            Ok(DocRow { position: position as i64, key, values })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn row(values: Vec<Scalar>) -> Vec<Scalar> {
        values
    }

    #[test]
    fn commit_and_checkout_round_trip() {
        let options = CreateOptions::keyed(vec!["Name".to_string()]);
        let archive = Archive::create(options, Box::new(MemoryStore::new())).unwrap();

        let v0 = archive
            .commit(
                vec!["Name".to_string(), "Age".to_string()],
                vec![row(vec![Scalar::Text("Alice".into()), Scalar::Integer(32)])],
                CommitInfo::default(),
            )
            .unwrap();
        assert_eq!(v0, 0);

        let table = archive.checkout(0).unwrap();
        assert_eq!(table.columns, vec!["Name", "Age"]);
        assert_eq!(table.rows, vec![vec![Scalar::Text("Alice".into()), Scalar::Integer(32)]]);
    }

    #[test]
    fn checkout_of_unknown_version_is_an_error() {
        let archive = Archive::create(CreateOptions::default(), Box::new(MemoryStore::new())).unwrap();
        let err = archive.checkout(5).unwrap_err();
        assert!(matches!(err, HistoryError::Version(5)));
    }

    #[test]
    fn apply_drops_and_transforms_rows() {
        let options = CreateOptions::keyed(vec!["Name".to_string()]);
        let archive = Archive::create(options, Box::new(MemoryStore::new())).unwrap();
        archive
            .commit(
                vec!["Name".to_string(), "Age".to_string()],
                vec![
                    row(vec![Scalar::Text("Alice".into()), Scalar::Integer(32)]),
                    row(vec![Scalar::Text("Bob".into()), Scalar::Integer(45)]),
                ],
                CommitInfo::default(),
            )
            .unwrap();

        let v1 = archive
            .apply(
                |_pos, mut r| {
                    if r[0] == Scalar::Text("Bob".into()) {
                        None
                    } else {
                        r[1] = Scalar::Integer(33);
                        Some(r)
                    }
                },
                CommitInfo::default(),
            )
            .unwrap();

        let table = archive.checkout(v1).unwrap();
        assert_eq!(table.rows, vec![vec![Scalar::Text("Alice".into()), Scalar::Integer(33)]]);
    }

    #[test]
    fn rollback_reverts_to_an_earlier_version() {
        let options = CreateOptions::keyed(vec!["Name".to_string()]);
        let archive = Archive::create(options, Box::new(MemoryStore::new())).unwrap();
        archive
            .commit(vec!["Name".to_string()], vec![row(vec![Scalar::Text("Alice".into())])], CommitInfo::default())
            .unwrap();
        archive
            .commit(
                vec!["Name".to_string()],
                vec![row(vec![Scalar::Text("Alice".into())]), row(vec![Scalar::Text("Bob".into())])],
                CommitInfo::default(),
            )
            .unwrap();

        archive.rollback(0).unwrap();
        assert_eq!(archive.current_version(), 0);
        assert!(archive.checkout(1).is_err());
        let table = archive.checkout(0).unwrap();
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn scenario_a_four_commits_reshuffle_and_revive_rows() {
        // spec.md §8 Scenario A, keyed by Name.
        let options = CreateOptions::keyed(vec!["Name".to_string()]);
        let archive = Archive::create(options, Box::new(MemoryStore::new())).unwrap();
        let cols = || vec!["Name".to_string(), "Age".to_string()];
        let person = |name: &str, age: i64| row(vec![Scalar::Text(name.to_string()), Scalar::Integer(age)]);

        archive
            .commit(
                cols(),
                vec![person("Alice", 32), person("Bob", 45), person("Claire", 27), person("Dave", 23)],
                CommitInfo::default(),
            )
            .unwrap();
        archive
            .commit(
                cols(),
                vec![person("Alice", 33), person("Bob", 44), person("Claire", 27), person("Dave", 23)],
                CommitInfo::default(),
            )
            .unwrap();
        archive
            .commit(
                cols(),
                vec![person("Alice", 32), person("Bob", 44), person("Claire", 27), person("Eve", 27)],
                CommitInfo::default(),
            )
            .unwrap();
        archive
            .commit(
                cols(),
                vec![person("Eve", 27), person("Claire", 28), person("Bob", 44), person("Alice", 32)],
                CommitInfo::default(),
            )
            .unwrap();

        let alice = archive.reader().into_iter().find(|r| r.row_id == 0).unwrap();
        assert_eq!(alice.key_at(0), Some(&vec![Scalar::Text("Alice".to_string())]));
        assert_eq!(alice.timestamp.intervals(), &[(0, 3)]);
        assert_eq!(alice.position_at(0), Some(0));
        assert_eq!(alice.position_at(2), Some(0));
        assert_eq!(alice.position_at(3), Some(3));

        let age_col = archive.schema_at(0).iter().find(|(_, n)| n == "Age").unwrap().0;
        let age_history = &alice.cells[&age_col];
        assert_eq!(age_history.value_at(0), Some(&Scalar::Integer(32)));
        assert_eq!(age_history.value_at(1), Some(&Scalar::Integer(33)));
        assert_eq!(age_history.value_at(2), Some(&Scalar::Integer(32)));
        assert_eq!(age_history.value_at(3), Some(&Scalar::Integer(32)));

        let dave = archive
            .reader()
            .into_iter()
            .find(|r| r.key_at(0) == Some(&vec![Scalar::Text("Dave".to_string())]))
            .unwrap();
        assert_eq!(dave.timestamp.intervals(), &[(0, 1)]);
        assert!(!dave.alive_at(2));

        let eve = archive
            .reader()
            .into_iter()
            .find(|r| r.key_at(2) == Some(&vec![Scalar::Text("Eve".to_string())]))
            .unwrap();
        assert_eq!(eve.row_id, 4);
        assert_eq!(eve.timestamp.intervals(), &[(2, 3)]);
        assert_eq!(eve.position_at(2), Some(3));
        assert_eq!(eve.position_at(3), Some(0));

        let table3 = archive.checkout(3).unwrap();
        assert_eq!(
            table3.rows,
            vec![
                vec![Scalar::Text("Eve".into()), Scalar::Integer(27)],
                vec![Scalar::Text("Claire".into()), Scalar::Integer(28)],
                vec![Scalar::Text("Bob".into()), Scalar::Integer(44)],
                vec![Scalar::Text("Alice".into()), Scalar::Integer(32)],
            ]
        );
    }

    #[test]
    fn scenario_c_commit_commit_rollback_to_first_version() {
        let options = CreateOptions::keyed(vec!["k".to_string()]);
        let archive = Archive::create(options, Box::new(MemoryStore::new())).unwrap();
        archive
            .commit(vec!["k".to_string(), "v".to_string()], vec![row(vec![Scalar::Text("A".into()), Scalar::Integer(1)])], CommitInfo::default())
            .unwrap();
        archive
            .commit(
                vec!["k".to_string(), "v".to_string()],
                vec![
                    row(vec![Scalar::Text("A".into()), Scalar::Integer(1)]),
                    row(vec![Scalar::Text("B".into()), Scalar::Integer(2)]),
                ],
                CommitInfo::default(),
            )
            .unwrap();

        archive.rollback(0).unwrap();

        assert_eq!(archive.snapshots().len(), 1);
        let table = archive.checkout(0).unwrap();
        assert_eq!(table.rows, vec![vec![Scalar::Text("A".into()), Scalar::Integer(1)]]);
        assert_eq!(archive.reader().len(), 1);
        assert_eq!(archive.reader()[0].timestamp.intervals(), &[(0, 0)]);
    }

    #[test]
    fn scenario_d_duplicate_key_in_one_snapshot_is_rejected() {
        let options = CreateOptions::keyed(vec!["k".to_string()]);
        let archive = Archive::create(options, Box::new(MemoryStore::new())).unwrap();
        let err = archive
            .commit(
                vec!["k".to_string(), "v".to_string()],
                vec![
                    row(vec![Scalar::Text("A".into()), Scalar::Integer(1)]),
                    row(vec![Scalar::Text("A".into()), Scalar::Integer(2)]),
                ],
                CommitInfo::default(),
            )
            .unwrap_err();
        assert!(matches!(err, HistoryError::DuplicateKey(_)));
        assert_eq!(archive.snapshots().len(), 0);
        // A failed commit must not leak the columns it allocated while
        // aligning the snapshot's schema before the duplicate was found.
        assert!(archive.schema_at(0).is_empty());
        assert_eq!(archive.current_version(), -1);
    }

    #[test]
    fn persisted_state_survives_reopen() {
        use tempfile::TempDir;
        use crate::store::FileStore;

        let dir = TempDir::new().unwrap();
        {
            let archive = Archive::create(
                CreateOptions::keyed(vec!["Name".to_string()]),
                Box::new(FileStore::open(dir.path()).unwrap()),
            )
            .unwrap();
            archive
                .commit(vec!["Name".to_string()], vec![row(vec![Scalar::Text("Alice".into())])], CommitInfo::default())
                .unwrap();
        }

        let reopened = Archive::open(Box::new(FileStore::open(dir.path()).unwrap())).unwrap();
        let table = reopened.checkout(0).unwrap();
        assert_eq!(table.rows, vec![vec![Scalar::Text("Alice".into())]]);
    }
}
