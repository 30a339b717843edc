//! The scalar value type stored in archive cells, keys, and names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A single cell value. Reconstructed tables are lists of rows of these,
/// aligned with the live schema; no dedicated table type is needed beyond
/// that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    DateTime(DateTime<Utc>),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }
}

/// Equivalence as defined by spec.md §3: equal scalars of the same
/// variant, except floats compare bit-exact and NaN is never equal to
/// anything, including another NaN.
impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => true,
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Integer(a), Scalar::Integer(b)) => a == b,
            (Scalar::Float(a), Scalar::Float(b)) => {
                if a.is_nan() || b.is_nan() {
                    false
                } else {
                    a.to_bits() == b.to_bits()
                }
            }
            (Scalar::Text(a), Scalar::Text(b)) => a == b,
            (Scalar::DateTime(a), Scalar::DateTime(b)) => a == b,
            _ => false,
        }
    }
}

/// Ordering used only for merge-key comparisons (spec.md §4.2: "nulls sort
/// before any non-null"). Not a general-purpose total order: two NaN
/// floats compare equal here so that sorted streams stay well-ordered,
/// even though `Scalar::eq` says they are unequal values.
pub fn key_cmp(a: &Scalar, b: &Scalar) -> Ordering {
    fn rank(s: &Scalar) -> u8 {
        match s {
            Scalar::Null => 0,
            Scalar::Bool(_) => 1,
            Scalar::Integer(_) => 2,
            Scalar::Float(_) => 3,
            Scalar::Text(_) => 4,
            Scalar::DateTime(_) => 5,
        }
    }
    match (a, b) {
        (Scalar::Null, Scalar::Null) => Ordering::Equal,
        (Scalar::Null, _) => Ordering::Less,
        (_, Scalar::Null) => Ordering::Greater,
        (Scalar::Bool(a), Scalar::Bool(b)) => a.cmp(b),
        (Scalar::Integer(a), Scalar::Integer(b)) => a.cmp(b),
        (Scalar::Float(a), Scalar::Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (Scalar::Text(a), Scalar::Text(b)) => a.cmp(b),
        (Scalar::DateTime(a), Scalar::DateTime(b)) => a.cmp(b),
        (a, b) => rank(a).cmp(&rank(b)),
    }
}

/// A merge/sort key: a tuple of scalars under the declared key columns
/// (or a singleton `[row index]` for un-keyed archives).
pub type Key = Vec<Scalar>;

pub fn key_tuple_cmp(a: &Key, b: &Key) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match key_cmp(x, y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_is_never_equal() {
        let nan = Scalar::Float(f64::NAN);
        assert_ne!(nan, nan);
        assert_ne!(Scalar::Float(f64::NAN), Scalar::Float(f64::NAN));
    }

    #[test]
    fn floats_compare_bit_exact() {
        assert_eq!(Scalar::Float(0.0), Scalar::Float(0.0));
        assert_ne!(Scalar::Float(0.0), Scalar::Float(-0.0));
    }

    #[test]
    fn null_sorts_before_non_null() {
        assert_eq!(key_cmp(&Scalar::Null, &Scalar::Integer(-999)), Ordering::Less);
        assert_eq!(key_cmp(&Scalar::Integer(1), &Scalar::Null), Ordering::Greater);
    }
}
