//! Core value types shared across the archive engine.

mod mvv;
mod scalar;
mod timestamp;

pub use mvv::{MultiVersionValue, TimestampedValue};
pub use scalar::{key_cmp, key_tuple_cmp, Key, Scalar};
pub use timestamp::{Timestamp, Version};

/// A reconstructed row: one scalar per live column, in column order.
pub type Row = Vec<Scalar>;

/// A reconstructed table: column names (in live order) plus rows in
/// position order.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}
