//! `TimestampedValue` and `MultiVersionValue`: the archive's core
//! value-history primitives (spec.md §3, §4.4 `extend`).

use super::timestamp::{Timestamp, Version};
use serde::{Deserialize, Serialize};

/// A scalar bound to the timestamp over which it held that value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampedValue<T> {
    pub value: T,
    pub timestamp: Timestamp,
}

impl<T> TimestampedValue<T> {
    pub fn new(value: T, timestamp: Timestamp) -> Self {
        Self { value, timestamp }
    }
}

/// A list of timestamped values whose timestamps are pairwise disjoint and
/// whose union is the timestamp of the containing entity (a row's
/// position, a column's name, a cell). `Single` is the common case and
/// avoids allocating a `Vec`.
///
/// Note: unlike the wire format of spec.md §6, the in-memory
/// representation never elides a timestamp — elision is a serialization
/// compactness trick applied by the `serialize` module when a value's
/// timestamp happens to equal its enclosing entity's, not a property of
/// this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MultiVersionValue<T> {
    Single(TimestampedValue<T>),
    Multi(Vec<TimestampedValue<T>>),
}

impl<T: PartialEq + Clone> MultiVersionValue<T> {
    pub fn singleton(value: T, timestamp: Timestamp) -> Self {
        MultiVersionValue::Single(TimestampedValue::new(value, timestamp))
    }

    /// All (value, timestamp) entries in ascending timestamp order.
    pub fn entries(&self) -> &[TimestampedValue<T>] {
        match self {
            MultiVersionValue::Single(tv) => std::slice::from_ref(tv),
            MultiVersionValue::Multi(list) => list,
        }
    }

    fn entries_mut(&mut self) -> EntriesMut<'_, T> {
        match self {
            MultiVersionValue::Single(_) => EntriesMut::Single,
            MultiVersionValue::Multi(list) => EntriesMut::Multi(list),
        }
    }

    /// The union of this value's timestamp: the versions over which the
    /// entity carried *some* value in this history.
    pub fn timestamp(&self) -> Timestamp {
        self.entries()
            .iter()
            .fold(Timestamp::empty(), |acc, tv| acc.union(&tv.timestamp))
    }

    /// The scalar live at version `v`, if any (exactly one entry's
    /// timestamp should contain `v`, by invariant).
    pub fn value_at(&self, v: Version) -> Option<&T> {
        self.entries()
            .iter()
            .find(|tv| tv.timestamp.contains(v))
            .map(|tv| &tv.value)
    }

    /// Fold `new_value` into this history at version `v`: extend the last
    /// entry's timestamp if the scalar is unchanged, otherwise start a new
    /// entry. This is the hot path of the merge engine (spec.md §4.4).
    pub fn extend(&mut self, new_value: T, v: Version) {
        let last_equal = match self.entries_mut() {
            EntriesMut::Single => match self {
                MultiVersionValue::Single(tv) => tv.value == new_value,
                _ => unreachable!(),
            },
            EntriesMut::Multi(list) => list.last().is_some_and(|tv| tv.value == new_value),
        };

        if last_equal {
            match self {
                MultiVersionValue::Single(tv) => {
                    tv.timestamp = tv.timestamp.append(v);
                }
                MultiVersionValue::Multi(list) => {
                    let last = list.last_mut().expect("multi is never empty");
                    last.timestamp = last.timestamp.append(v);
                }
            }
            return;
        }

        let new_entry = TimestampedValue::new(new_value, Timestamp::single(v));
        match std::mem::replace(self, MultiVersionValue::Multi(Vec::new())) {
            MultiVersionValue::Single(tv) => {
                *self = MultiVersionValue::Multi(vec![tv, new_entry]);
            }
            MultiVersionValue::Multi(mut list) => {
                list.push(new_entry);
                *self = MultiVersionValue::Multi(list);
            }
        }
    }

    /// Drop all versions above `v`, truncating or removing entries whose
    /// timestamp falls (partly or wholly) above `v`. Returns `true` if the
    /// resulting history is empty.
    pub fn rollback(&mut self, v: Version) -> bool {
        let mut entries: Vec<TimestampedValue<T>> = self
            .entries()
            .iter()
            .filter_map(|tv| {
                let rolled = tv.timestamp.rollback(v);
                if rolled.is_empty() {
                    None
                } else {
                    Some(TimestampedValue::new(tv.value.clone(), rolled))
                }
            })
            .collect();

        if entries.is_empty() {
            return true;
        }
        *self = if entries.len() == 1 {
            MultiVersionValue::Single(entries.remove(0))
        } else {
            MultiVersionValue::Multi(entries)
        };
        false
    }
}

enum EntriesMut<'a, T> {
    Single,
    Multi(&'a mut Vec<TimestampedValue<T>>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_same_value_merges_into_single() {
        let mut mvv = MultiVersionValue::singleton(32i64, Timestamp::range(0, 0));
        mvv.extend(32, 1);
        assert_eq!(mvv, MultiVersionValue::Single(TimestampedValue::new(32, Timestamp::range(0, 1))));
    }

    #[test]
    fn extend_new_value_promotes_to_multi() {
        let mut mvv = MultiVersionValue::singleton(32i64, Timestamp::range(0, 0));
        mvv.extend(33, 1);
        assert_eq!(
            mvv,
            MultiVersionValue::Multi(vec![
                TimestampedValue::new(32, Timestamp::range(0, 0)),
                TimestampedValue::new(33, Timestamp::single(1)),
            ])
        );
    }

    #[test]
    fn extend_reverting_to_old_value_starts_new_entry_not_merge() {
        // Scenario A: Alice's age goes 32 -> 33 -> 32.
        let mut mvv = MultiVersionValue::singleton(32i64, Timestamp::single(0));
        mvv.extend(33, 1);
        mvv.extend(32, 2);
        mvv.extend(32, 3);
        assert_eq!(
            mvv,
            MultiVersionValue::Multi(vec![
                TimestampedValue::new(32, Timestamp::single(0)),
                TimestampedValue::new(33, Timestamp::single(1)),
                TimestampedValue::new(32, Timestamp::range(2, 3)),
            ])
        );
        assert_eq!(mvv.value_at(0), Some(&32));
        assert_eq!(mvv.value_at(1), Some(&33));
        assert_eq!(mvv.value_at(3), Some(&32));
    }

    #[test]
    fn rollback_drops_future_entries_and_truncates_boundary() {
        let mut mvv = MultiVersionValue::Multi(vec![
            TimestampedValue::new(32, Timestamp::single(0)),
            TimestampedValue::new(33, Timestamp::single(1)),
            TimestampedValue::new(32, Timestamp::range(2, 3)),
        ]);
        let emptied = mvv.rollback(1);
        assert!(!emptied);
        assert_eq!(
            mvv,
            MultiVersionValue::Multi(vec![
                TimestampedValue::new(32, Timestamp::single(0)),
                TimestampedValue::new(33, Timestamp::single(1)),
            ])
        );
    }

    #[test]
    fn rollback_past_all_entries_reports_empty() {
        let mut mvv = MultiVersionValue::singleton(1i64, Timestamp::single(5));
        assert!(mvv.rollback(0));
    }
}
