//! The merge engine: a streaming two-way outer join of the archive's row
//! stream with a new snapshot's row stream (spec.md §4.4).

use crate::document::Document;
use crate::error::{HistoryError, Result};
use crate::row::ArchiveRow;
use crate::schema::{ColumnMatchPolicy, Schema};
use crate::types::{key_tuple_cmp, Key, MultiVersionValue, Scalar, Timestamp, Version};
use std::cmp::Ordering;

/// Parameters that do not change row-to-row during one merge.
pub struct MergeOptions {
    pub policy: ColumnMatchPolicy,
    pub keyed: bool,
    pub immutable_key: bool,
}

/// The merge key a row is ordered by in the archive's row stream: the
/// most recently assigned key value, regardless of whether the row is
/// still alive. Terminated rows keep their last key so that a later
/// snapshot reusing that key re-matches (and revives) the same row_id.
fn last_known_key(row: &ArchiveRow) -> &Key {
    &row.key.entries().last().expect("a row's key history is never empty").value
}

/// Fold a new snapshot into `archive_rows` at `version`, producing the
/// updated row stream. `archive_rows` must already be ordered by
/// [`last_known_key`] (the invariant each prior merge leaves behind).
pub fn merge(
    archive_rows: Vec<ArchiveRow>,
    doc: &dyn Document,
    schema: &mut Schema,
    next_row_id: &mut u64,
    version: Version,
    opts: &MergeOptions,
) -> Result<Vec<ArchiveRow>> {
    let col_ids = schema.align(doc.columns(), opts.policy, version);

    let mut a_iter = archive_rows.into_iter().peekable();
    let mut out = Vec::with_capacity(a_iter.len());
    let mut last_seen_key: Option<Key> = None;

    for doc_row in doc.iter() {
        let b = doc_row?;

        let forces_new_row = !opts.keyed && b.key.first() == Some(&Scalar::Null);

        // Keyed archives must see ascending, duplicate-free primary keys;
        // un-keyed archives must see ascending, duplicate-free row indices.
        // Null row indices are exempt from both checks since they always
        // force a fresh row regardless of position (spec.md §4.2, §4.4).
        if !forces_new_row {
            if let Some(prev) = &last_seen_key {
                match key_tuple_cmp(prev, &b.key) {
                    Ordering::Equal => {
                        return Err(HistoryError::DuplicateKey(format!("{:?}", b.key)))
                    }
                    Ordering::Greater => {
                        return Err(HistoryError::UnsortedInput(format!(
                            "document rows must be sorted ascending by {}",
                            if opts.keyed { "primary key" } else { "row index" }
                        )))
                    }
                    Ordering::Less => {}
                }
            }
            last_seen_key = Some(b.key.clone());
        }

        while let Some(a_peek) = a_iter.peek() {
            if key_tuple_cmp(last_known_key(a_peek), &b.key) == Ordering::Less {
                out.push(a_iter.next().unwrap());
            } else {
                break;
            }
        }

        let matched = if forces_new_row {
            None
        } else {
            match a_iter.peek() {
                Some(a_peek) if key_tuple_cmp(last_known_key(a_peek), &b.key) == Ordering::Equal => {
                    a_iter.next()
                }
                _ => None,
            }
        };

        match matched {
            Some(mut a) => {
                if a.timestamp.contains(version) {
                    return Err(HistoryError::Integrity(format!(
                        "row {} is already present at version {version}",
                        a.row_id
                    )));
                }
                if opts.immutable_key {
                    let current_key = &last_known_key(&a).clone();
                    if current_key != &b.key {
                        return Err(HistoryError::Schema(format!(
                            "row {} key changed from {current_key:?} to {:?}, but key columns are declared immutable",
                            a.row_id, b.key
                        )));
                    }
                }

                a.timestamp = a.timestamp.append(version);
                a.key.extend(b.key.clone(), version);
                a.position.extend(b.position, version);
                for (col_id, value) in col_ids.iter().zip(b.values.iter()) {
                    match a.cells.get_mut(col_id) {
                        Some(mvv) => mvv.extend(value.clone(), version),
                        None => {
                            a.cells.insert(
                                *col_id,
                                MultiVersionValue::singleton(value.clone(), Timestamp::single(version)),
                            );
                        }
                    }
                }
                out.push(a);
            }
            None => {
                let row_id = *next_row_id;
                *next_row_id += 1;
                let mut row = ArchiveRow::new(row_id, b.key.clone(), b.position, version);
                for (col_id, value) in col_ids.iter().zip(b.values.iter()) {
                    row.cells
                        .insert(*col_id, MultiVersionValue::singleton(value.clone(), Timestamp::single(version)));
                }
                out.push(row);
            }
        }
    }

    out.extend(a_iter);

    // The writer sorts by the key each row carries into the *next* merge;
    // for archives whose key columns may change value this can differ
    // from the order rows arrived in, so a final sort restores the
    // invariant instead of spilling to an external run mid-stream.
    out.sort_by(|x, y| key_tuple_cmp(last_known_key(x), last_known_key(y)));
    Ok(out)
}
