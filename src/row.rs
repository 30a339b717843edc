//! Archive row: an identity-bearing entity carrying timestamped key,
//! position, and per-column cell histories (spec.md §3).

use crate::schema::ColId;
use crate::types::{Key, MultiVersionValue, Scalar, Timestamp, Version};
use std::collections::BTreeMap;

pub type RowId = u64;

/// One row's full version history.
///
/// Invariants (enforced by the merge/rollback engines, not by this type
/// directly): `timestamp ⊇ position.timestamp()`, `timestamp ⊇ ⋃
/// cells[c].timestamp()` for every live column `c`, and `cells[c].timestamp()
/// ⊆ timestamp ∩ schema.column(c).timestamp`. A column absent from `cells`
/// is implicitly null over that intersection.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ArchiveRow {
    pub row_id: RowId,
    pub key: MultiVersionValue<Key>,
    pub timestamp: Timestamp,
    pub position: MultiVersionValue<i64>,
    pub cells: BTreeMap<ColId, MultiVersionValue<Scalar>>,
}

impl ArchiveRow {
    pub fn new(row_id: RowId, key: Key, position: i64, v: Version) -> Self {
        let ts = Timestamp::single(v);
        ArchiveRow {
            row_id,
            key: MultiVersionValue::singleton(key, ts.clone()),
            timestamp: ts.clone(),
            position: MultiVersionValue::singleton(position, ts),
            cells: BTreeMap::new(),
        }
    }

    pub fn key_at(&self, v: Version) -> Option<&Key> {
        self.key.value_at(v)
    }

    pub fn position_at(&self, v: Version) -> Option<i64> {
        self.position.value_at(v).copied()
    }

    pub fn cell_at(&self, col_id: ColId, v: Version) -> Option<&Scalar> {
        self.cells.get(&col_id).and_then(|mvv| mvv.value_at(v))
    }

    /// Whether this row exists (has at least one live column or position)
    /// at version `v`.
    pub fn alive_at(&self, v: Version) -> bool {
        self.timestamp.contains(v)
    }

    /// Drop all versions above `v`; returns `true` if the row's timestamp
    /// becomes empty and it should be removed from the archive.
    pub fn rollback(&mut self, v: Version) -> bool {
        self.timestamp = self.timestamp.rollback(v);
        if self.timestamp.is_empty() {
            return true;
        }
        let _ = self.key.rollback(v);
        let _ = self.position.rollback(v);
        self.cells.retain(|_, mvv| !mvv.rollback(v));
        false
    }
}
