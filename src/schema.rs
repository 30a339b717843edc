//! Archive schema: the ordered, identity-bearing set of columns
//! (spec.md §3 `ArchiveColumn`, §4.3 schema alignment).

use crate::types::{MultiVersionValue, Timestamp, Version};
use serde::{Deserialize, Serialize};

pub type ColId = u64;

/// How an incoming snapshot column is matched to an existing archive
/// column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnMatchPolicy {
    /// Match by a caller-supplied external identifier (falls back to
    /// by-name when the document provides none).
    ById,
    /// Match by column name.
    ByName,
}

impl Default for ColumnMatchPolicy {
    fn default() -> Self {
        ColumnMatchPolicy::ByName
    }
}

/// A single archive column: stable identity, timestamped name, and
/// timestamped position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveColumn {
    pub col_id: ColId,
    pub name: MultiVersionValue<String>,
    pub position: MultiVersionValue<i64>,
    pub timestamp: Timestamp,
}

impl ArchiveColumn {
    pub fn name_at(&self, v: Version) -> Option<&str> {
        self.name.value_at(v).map(String::as_str)
    }

    pub fn position_at(&self, v: Version) -> Option<i64> {
        self.position.value_at(v).copied()
    }
}

/// The ordered set of archive columns, keyed by stable integer id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<ArchiveColumn>,
    next_col_id: ColId,
}

impl Schema {
    pub fn new() -> Self {
        Self { columns: Vec::new(), next_col_id: 0 }
    }

    pub fn columns(&self) -> &[ArchiveColumn] {
        &self.columns
    }

    /// Rebuild a schema from persisted columns (store load path). Callers
    /// must also call [`Schema::set_next_col_id`] once all columns are
    /// restored.
    pub fn restore_column(&mut self, column: ArchiveColumn) {
        self.columns.push(column);
    }

    pub fn set_next_col_id(&mut self, next_col_id: ColId) {
        self.next_col_id = next_col_id;
    }

    pub fn next_col_id(&self) -> ColId {
        self.next_col_id
    }

    pub fn find_by_id(&self, col_id: ColId) -> Option<&ArchiveColumn> {
        self.columns.iter().find(|c| c.col_id == col_id)
    }

    /// Find a column that has ever carried `name`, at any point in its
    /// history (not only while currently live) so that a column can be
    /// re-matched after a gap or a rename back to an old name.
    fn find_by_name(&self, name: &str) -> Option<&ArchiveColumn> {
        self.columns
            .iter()
            .find(|c| c.name.entries().iter().any(|tv| tv.value == name))
    }

    /// Ordered `(col_id, name)` pairs live at version `v`, sorted by
    /// position.
    pub fn columns_at(&self, v: Version) -> Vec<(ColId, String)> {
        let mut live: Vec<(i64, ColId, String)> = self
            .columns
            .iter()
            .filter(|c| c.timestamp.contains(v))
            .filter_map(|c| {
                let pos = c.position_at(v)?;
                let name = c.name_at(v)?.to_string();
                Some((pos, c.col_id, name))
            })
            .collect();
        live.sort_by_key(|(pos, _, _)| *pos);
        live.into_iter().map(|(_, id, name)| (id, name)).collect()
    }

    /// Align the snapshot's column names against the existing schema at
    /// version `v`, extending matched columns' timestamp/name/position and
    /// allocating fresh `col_id`s for unmatched ones. Returns the col_id
    /// for each snapshot column, in snapshot order.
    ///
    /// Columns absent from the snapshot are left untouched: their
    /// timestamp simply does not gain `v`.
    pub fn align(&mut self, names: &[String], policy: ColumnMatchPolicy, v: Version) -> Vec<ColId> {
        let mut ids = Vec::with_capacity(names.len());
        for (position, name) in names.iter().enumerate() {
            let existing = match policy {
                ColumnMatchPolicy::ByName | ColumnMatchPolicy::ById => {
                    self.find_by_name(name).map(|c| c.col_id)
                }
            };

            let col_id = match existing {
                Some(id) => id,
                None => {
                    let id = self.next_col_id;
                    self.next_col_id += 1;
                    self.columns.push(ArchiveColumn {
                        col_id: id,
                        name: MultiVersionValue::singleton(name.clone(), Timestamp::single(v)),
                        position: MultiVersionValue::singleton(position as i64, Timestamp::single(v)),
                        timestamp: Timestamp::single(v),
                    });
                    ids.push(id);
                    continue;
                }
            };

            let col = self.columns.iter_mut().find(|c| c.col_id == col_id).expect("just matched");
            col.timestamp = col.timestamp.append(v);
            col.name.extend(name.clone(), v);
            col.position.extend(position as i64, v);
            ids.push(col_id);
        }
        ids
    }

    /// Truncate every column's timestamp/name/position history to
    /// versions `<= v`, removing columns whose timestamp becomes empty.
    pub fn rollback(&mut self, v: Version) {
        self.columns.retain_mut(|c| {
            c.timestamp = c.timestamp.rollback(v);
            if c.timestamp.is_empty() {
                return false;
            }
            let _ = c.name.rollback(v);
            let _ = c.position.rollback(v);
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_allocates_fresh_ids_for_new_columns() {
        let mut schema = Schema::new();
        let ids = schema.align(&["Name".to_string(), "Age".to_string()], ColumnMatchPolicy::ByName, 0);
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(schema.columns_at(0), vec![(0, "Name".to_string()), (1, "Age".to_string())]);
    }

    #[test]
    fn align_matches_existing_columns_by_name_and_extends_timestamp() {
        let mut schema = Schema::new();
        schema.align(&["Name".to_string(), "Age".to_string()], ColumnMatchPolicy::ByName, 0);
        let ids = schema.align(&["Name".to_string(), "Age".to_string()], ColumnMatchPolicy::ByName, 1);
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(schema.find_by_id(0).unwrap().timestamp.intervals(), &[(0, 1)]);
    }

    #[test]
    fn column_absent_from_snapshot_keeps_prior_timestamp_only() {
        let mut schema = Schema::new();
        schema.align(&["Name".to_string(), "Age".to_string()], ColumnMatchPolicy::ByName, 0);
        schema.align(&["Name".to_string()], ColumnMatchPolicy::ByName, 1);
        let age = schema.find_by_id(1).unwrap();
        assert_eq!(age.timestamp.intervals(), &[(0, 0)]);
        assert!(!schema.columns_at(1).iter().any(|(id, _)| *id == 1));
    }

    #[test]
    fn rollback_drops_columns_born_after_the_target_version() {
        let mut schema = Schema::new();
        schema.align(&["Name".to_string()], ColumnMatchPolicy::ByName, 0);
        schema.align(&["Name".to_string(), "Age".to_string()], ColumnMatchPolicy::ByName, 1);
        schema.rollback(0);
        assert!(schema.find_by_id(1).is_none());
        assert!(schema.find_by_id(0).is_some());
    }
}
