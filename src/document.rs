//! The `Document` abstraction: an external snapshot source (spec.md §4.2).
//!
//! The core only depends on this trait; concrete adapters (delimited-text
//! with external sort, record-stream readers) are peripheral collaborators
//! and out of scope here. `InMemoryDocument` is the one concrete
//! implementation the core ships, so the engine is exercisable without an
//! adapter crate.

use crate::error::Result;
use crate::types::{Key, Scalar};

/// One row as presented by a `Document`: its 0-based position in the
/// snapshot, its merge key (primary-key tuple, or caller-provided row
/// index for un-keyed archives), and its values positional w.r.t.
/// `Document::columns()`.
#[derive(Debug, Clone, PartialEq)]
pub struct DocRow {
    pub position: i64,
    pub key: Key,
    pub values: Vec<Scalar>,
}

/// A snapshot source: column names plus a row iterator.
///
/// Implementations are polymorphic over `{columns, iter, sorted_by,
/// close}`; `close` is modeled as `Drop` rather than an explicit method in
/// this Rust port, since RAII gives the same scoped-release guarantee
/// spec.md §4.2 asks for without a fallible teardown call.
pub trait Document {
    fn columns(&self) -> &[String];

    /// A row iterator. For keyed archives the merge engine requires this
    /// to yield rows in ascending key order; for un-keyed archives, in
    /// ascending row-index order. Violating that is an `UnsortedInput`
    /// error raised by the merge engine, not by the document itself.
    fn iter(&self) -> Box<dyn Iterator<Item = Result<DocRow>> + '_>;
}

/// A fully materialized, in-memory document. `sorted_by_key` returns a new
/// document with rows sorted ascending by merge key, using an in-memory
/// sort (the external-merge-sort variant required for large snapshots is
/// a peripheral adapter concern, not implemented here).
#[derive(Debug, Clone)]
pub struct InMemoryDocument {
    columns: Vec<String>,
    rows: Vec<DocRow>,
}

impl InMemoryDocument {
    pub fn new(columns: Vec<String>, rows: Vec<DocRow>) -> Self {
        Self { columns, rows }
    }

    pub fn sorted_by_key(mut self) -> Self {
        self.rows.sort_by(|a, b| crate::types::key_tuple_cmp(&a.key, &b.key));
        self
    }

    pub fn is_sorted_by_key(&self) -> bool {
        self.rows.windows(2).all(|w| crate::types::key_tuple_cmp(&w[0].key, &w[1].key) != std::cmp::Ordering::Greater)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Document for InMemoryDocument {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn iter(&self) -> Box<dyn Iterator<Item = Result<DocRow>> + '_> {
        Box::new(self.rows.iter().cloned().map(Ok))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Scalar;

    fn row(position: i64, key: i64, name: &str) -> DocRow {
        DocRow { position, key: vec![Scalar::Integer(key)], values: vec![Scalar::Text(name.to_string())] }
    }

    #[test]
    fn sorted_by_key_orders_rows_ascending() {
        let doc = InMemoryDocument::new(
            vec!["name".to_string()],
            vec![row(0, 3, "c"), row(1, 1, "a"), row(2, 2, "b")],
        )
        .sorted_by_key();
        assert!(doc.is_sorted_by_key());
        let keys: Vec<_> = doc.iter().map(|r| r.unwrap().key).collect();
        assert_eq!(keys, vec![vec![Scalar::Integer(1)], vec![Scalar::Integer(2)], vec![Scalar::Integer(3)]]);
    }
}
