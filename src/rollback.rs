//! Rollback: truncate the archive to retain only versions `<= v` (spec.md §4.6).

use crate::row::ArchiveRow;
use crate::schema::Schema;
use crate::snapshot::SnapshotListing;
use crate::types::Version;

/// Apply `Timestamp::rollback(v)` to every timestamp in the archive,
/// dropping rows/columns whose resulting timestamp is empty and removing
/// snapshots committed after `v`. All-or-nothing: this function never
/// leaves the archive partially truncated (every mutation here is
/// infallible once invoked).
pub fn rollback(schema: &mut Schema, rows: &mut Vec<ArchiveRow>, snapshots: &mut SnapshotListing, v: Version) {
    schema.rollback(v);
    rows.retain_mut(|row| !row.rollback(v));
    snapshots.rollback(v);
}
