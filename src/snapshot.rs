//! Snapshot metadata: one entry per committed version (spec.md §3, §4.7).

use crate::types::Version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata describing one committed version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDescriptor {
    pub version: Version,
    pub committed_at: DateTime<Utc>,
    pub description: Option<String>,
    pub operation: Option<String>,
    pub source: Option<String>,
}

impl SnapshotDescriptor {
    pub fn new(version: Version, committed_at: DateTime<Utc>) -> Self {
        Self { version, committed_at, description: None, operation: None, source: None }
    }
}

/// Ordered metadata for every committed version, indexable by version
/// number and by position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotListing {
    entries: Vec<SnapshotDescriptor>,
}

impl SnapshotListing {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn push(&mut self, descriptor: SnapshotDescriptor) {
        self.entries.push(descriptor);
    }

    pub fn as_slice(&self) -> &[SnapshotDescriptor] {
        &self.entries
    }

    pub fn at_position(&self, position: usize) -> Option<&SnapshotDescriptor> {
        self.entries.get(position)
    }

    pub fn by_version(&self, version: Version) -> Option<&SnapshotDescriptor> {
        self.entries.iter().find(|d| d.version == version)
    }

    /// Drop every snapshot with `version > v`.
    pub fn rollback(&mut self, v: Version) {
        self.entries.retain(|d| d.version <= v);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
