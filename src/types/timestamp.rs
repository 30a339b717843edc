//! Timestamp algebra: a canonical, coalesced list of closed version intervals.
//!
//! A `Timestamp` is the fundamental annotation on every row, column,
//! position, and cell value in the archive: the set of versions in which
//! the annotated entity held a given state. Operations always return a new
//! value; a `Timestamp` never mutates in place.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A version number. Non-negative in practice (the first committed
/// snapshot is version 0); `-1` is used as a rollback argument meaning
/// "keep nothing".
pub type Version = i64;

/// A sorted, coalesced list of disjoint closed intervals `[a, b]` with
/// `a <= b`. No two intervals touch or overlap. The empty list represents
/// "never".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    intervals: Vec<(Version, Version)>,
}

impl Timestamp {
    /// The empty timestamp ("never").
    pub fn empty() -> Self {
        Self { intervals: Vec::new() }
    }

    /// A timestamp containing exactly one version.
    pub fn single(v: Version) -> Self {
        Self { intervals: vec![(v, v)] }
    }

    /// A timestamp spanning the closed range `[a, b]`.
    pub fn range(a: Version, b: Version) -> Self {
        debug_assert!(a <= b);
        Self { intervals: vec![(a, b)] }
    }

    /// Construct directly from an already-canonical interval list. Used by
    /// the serializer when decoding trusted records.
    pub fn from_intervals(intervals: Vec<(Version, Version)>) -> Self {
        let t = Self { intervals };
        debug_assert!(t.is_canonical());
        t
    }

    pub fn intervals(&self) -> &[(Version, Version)] {
        &self.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Whether version `v` is a member of this timestamp.
    pub fn contains(&self, v: Version) -> bool {
        self.intervals
            .binary_search_by(|&(a, b)| {
                if v < a {
                    Ordering::Greater
                } else if v > b {
                    Ordering::Less
                } else {
                    Ordering::Equal
                }
            })
            .is_ok()
    }

    /// The largest version in this timestamp, if any.
    pub fn last_version(&self) -> Option<Version> {
        self.intervals.last().map(|&(_, b)| b)
    }

    /// The smallest version in this timestamp, if any.
    pub fn first_version(&self) -> Option<Version> {
        self.intervals.first().map(|&(a, _)| a)
    }

    pub fn is_equal(&self, other: &Timestamp) -> bool {
        self == other
    }

    /// The union of `self` and `other`, coalescing adjacent/overlapping
    /// intervals. O(|self| + |other|).
    pub fn union(&self, other: &Timestamp) -> Timestamp {
        let mut merged: Vec<(Version, Version)> =
            Vec::with_capacity(self.intervals.len() + other.intervals.len());
        merged.extend_from_slice(&self.intervals);
        merged.extend_from_slice(&other.intervals);
        merged.sort_unstable_by_key(|&(a, _)| a);

        let mut out: Vec<(Version, Version)> = Vec::with_capacity(merged.len());
        for (a, b) in merged {
            match out.last_mut() {
                Some((_, last_b)) if a <= *last_b + 1 => {
                    if b > *last_b {
                        *last_b = b;
                    }
                }
                _ => out.push((a, b)),
            }
        }
        Timestamp { intervals: out }
    }

    /// The intersection of `self` and `other`. O(|self| + |other|).
    pub fn intersection(&self, other: &Timestamp) -> Timestamp {
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        let (a, b) = (&self.intervals, &other.intervals);
        while i < a.len() && j < b.len() {
            let (s1, e1) = a[i];
            let (s2, e2) = b[j];
            let lo = s1.max(s2);
            let hi = e1.min(e2);
            if lo <= hi {
                out.push((lo, hi));
            }
            if e1 < e2 {
                i += 1;
            } else {
                j += 1;
            }
        }
        Timestamp { intervals: out }
    }

    /// Extend this timestamp to include `v`, coalescing with the
    /// neighboring interval if adjacent. Idempotent when `v` is already a
    /// member.
    pub fn append(&self, v: Version) -> Timestamp {
        if self.contains(v) {
            return self.clone();
        }
        self.union(&Timestamp::single(v))
    }

    /// Truncate this timestamp to retain only versions `<= v`.
    pub fn rollback(&self, v: Version) -> Timestamp {
        let mut out = Vec::new();
        for &(a, b) in &self.intervals {
            if a > v {
                break;
            }
            out.push((a, b.min(v)));
        }
        Timestamp { intervals: out }
    }

    fn is_canonical(&self) -> bool {
        self.intervals.windows(2).all(|w| {
            let (_, b0) = w[0];
            let (a1, _) = w[1];
            a1 > b0 + 1
        }) && self.intervals.iter().all(|&(a, b)| a <= b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_extends_adjacent_interval() {
        let t = Timestamp::range(0, 2).append(3);
        assert_eq!(t.intervals(), &[(0, 3)]);
    }

    #[test]
    fn append_is_idempotent() {
        let t = Timestamp::range(0, 3);
        assert_eq!(t.append(2), t);
    }

    #[test]
    fn append_starts_new_interval_on_gap() {
        let t = Timestamp::range(0, 1).append(3);
        assert_eq!(t.intervals(), &[(0, 1), (3, 3)]);
    }

    #[test]
    fn union_coalesces_touching_intervals() {
        let a = Timestamp::from_intervals(vec![(0, 1), (4, 5)]);
        let b = Timestamp::from_intervals(vec![(2, 3)]);
        assert_eq!(a.union(&b).intervals(), &[(0, 5)]);
    }

    #[test]
    fn union_is_commutative_and_canonical() {
        let a = Timestamp::from_intervals(vec![(0, 0), (5, 7)]);
        let b = Timestamp::from_intervals(vec![(1, 4), (8, 8)]);
        assert_eq!(a.union(&b).intervals(), &[(0, 8)]);
        assert_eq!(a.union(&b), b.union(&a));
    }

    #[test]
    fn intersection_keeps_only_shared_versions() {
        let a = Timestamp::from_intervals(vec![(0, 5)]);
        let b = Timestamp::from_intervals(vec![(3, 10)]);
        assert_eq!(a.intersection(&b).intervals(), &[(3, 5)]);
    }

    #[test]
    fn rollback_truncates_and_drops_future_intervals() {
        let t = Timestamp::from_intervals(vec![(0, 2), (5, 9)]);
        assert_eq!(t.rollback(6).intervals(), &[(0, 2), (5, 6)]);
        assert_eq!(t.rollback(1).intervals(), &[(0, 1)]);
        assert!(t.rollback(-1).is_empty());
    }

    #[test]
    fn contains_and_last_version() {
        let t = Timestamp::from_intervals(vec![(0, 2), (5, 9)]);
        assert!(t.contains(0));
        assert!(t.contains(7));
        assert!(!t.contains(3));
        assert!(!t.contains(10));
        assert_eq!(t.last_version(), Some(9));
        assert_eq!(t.first_version(), Some(0));
    }
}
