//! Checkout: reconstruct a single version as an ordered table (spec.md §4.5).

use crate::error::{HistoryError, Result};
use crate::row::ArchiveRow;
use crate::schema::Schema;
use crate::types::{Row, Table, Version};

/// Reconstruct the table live at version `v`: every row whose timestamp
/// contains `v`, each projected to its value at `v` in every cell and
/// position, ordered by extracted position ascending.
pub fn checkout(schema: &Schema, rows: &[ArchiveRow], v: Version) -> Result<Table> {
    // An empty/never-committed-to table is not itself an error here;
    // VersionError is reserved for versions the archive never committed
    // at all, which the facade checks against the snapshot listing.
    let columns = schema.columns_at(v);

    let mut positioned: Vec<(i64, Row)> = Vec::new();
    for row in rows {
        if !row.alive_at(v) {
            continue;
        }
        let position = row
            .position_at(v)
            .ok_or_else(|| HistoryError::Integrity(format!("row {} alive at {v} has no position", row.row_id)))?;

        let mut values = Vec::with_capacity(columns.len());
        for (col_id, _) in &columns {
            let value = row.cell_at(*col_id, v).cloned().unwrap_or(crate::types::Scalar::Null);
            values.push(value);
        }
        positioned.push((position, values));
    }
    positioned.sort_by_key(|(pos, _)| *pos);

    Ok(Table {
        columns: columns.into_iter().map(|(_, name)| name).collect(),
        rows: positioned.into_iter().map(|(_, row)| row).collect(),
    })
}

/// Raw, unordered-by-version access to every archive row, for provenance
/// inspection (spec.md §4.5 `reader()`).
pub fn reader(rows: &[ArchiveRow]) -> impl Iterator<Item = &ArchiveRow> {
    rows.iter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocRow, InMemoryDocument};
    use crate::merge::{merge, MergeOptions};
    use crate::schema::ColumnMatchPolicy;
    use crate::types::Scalar;

    fn opts() -> MergeOptions {
        MergeOptions { policy: ColumnMatchPolicy::ByName, keyed: true, immutable_key: false }
    }

    fn doc(rows: Vec<(i64, &str, i64)>) -> InMemoryDocument {
        InMemoryDocument::new(
            vec!["Name".to_string(), "Age".to_string()],
            rows.into_iter()
                .map(|(pos, name, age)| DocRow {
                    position: pos,
                    key: vec![Scalar::Text(name.to_string())],
                    values: vec![Scalar::Text(name.to_string()), Scalar::Integer(age)],
                })
                .collect(),
        )
    }

    #[test]
    fn checkout_reconstructs_ordered_table() {
        let mut schema = Schema::new();
        let mut next_id = 0u64;
        let d0 = doc(vec![(0, "Alice", 32), (1, "Bob", 45)]);
        let v0 = merge(vec![], &d0, &mut schema, &mut next_id, 0, &opts()).unwrap();

        let table = checkout(&schema, &v0, 0).unwrap();
        assert_eq!(table.columns, vec!["Name", "Age"]);
        assert_eq!(
            table.rows,
            vec![
                vec![Scalar::Text("Alice".into()), Scalar::Integer(32)],
                vec![Scalar::Text("Bob".into()), Scalar::Integer(45)],
            ]
        );
    }

    #[test]
    fn checkout_excludes_rows_not_alive_at_version() {
        let mut schema = Schema::new();
        let mut next_id = 0u64;
        let d0 = doc(vec![(0, "Alice", 32), (1, "Dave", 23)]);
        let v0 = merge(vec![], &d0, &mut schema, &mut next_id, 0, &opts()).unwrap();
        let d1 = doc(vec![(0, "Alice", 32)]);
        let v1 = merge(v0, &d1, &mut schema, &mut next_id, 1, &opts()).unwrap();

        let table = checkout(&schema, &v1, 1).unwrap();
        assert_eq!(table.rows, vec![vec![Scalar::Text("Alice".into()), Scalar::Integer(32)]]);
    }
}
