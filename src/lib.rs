//! A compact nested-merge archive for a temporal sequence of tabular
//! dataset snapshots.
//!
//! Each commit is folded into the archive by a streaming merge against
//! the prior row stream (see [`merge`]); the result is a single
//! structure from which any committed version can be reconstructed
//! ([`checkout`]) or the archive truncated back to an earlier point
//! ([`rollback`]). [`Archive`] is the facade most callers want.

pub mod archive;
pub mod checkout;
pub mod config;
pub mod document;
pub mod error;
pub mod merge;
pub mod row;
pub mod rollback;
pub mod schema;
pub mod serialize;
pub mod snapshot;
pub mod store;
pub mod types;

pub use archive::{Archive, CommitInfo};
pub use checkout::checkout;
pub use config::CreateOptions;
pub use document::{DocRow, Document, InMemoryDocument};
pub use error::{HistoryError, Result};
pub use merge::{merge, MergeOptions};
pub use row::{ArchiveRow, RowId};
pub use rollback::rollback;
pub use schema::{ArchiveColumn, ColId, ColumnMatchPolicy, Schema};
pub use snapshot::{SnapshotDescriptor, SnapshotListing};
pub use store::{ArchiveState, FileStore, MemoryStore, Store};
pub use types::{Key, MultiVersionValue, Row, Scalar, Table, Timestamp, TimestampedValue, Version};
