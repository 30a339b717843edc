//! Persisted-state backends (spec.md §6): an in-memory store for tests
//! and short-lived archives, and a file-backed store using staged writes
//! plus CRC32 integrity checks.

use crate::error::{HistoryError, Result};
use crate::row::ArchiveRow;
use crate::schema::{ArchiveColumn, ColumnMatchPolicy, Schema};
use crate::snapshot::SnapshotListing;
use crate::types::Version;
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Everything needed to rebuild an `Archive` in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveState {
    pub columns: Vec<ArchiveColumn>,
    pub rows: Vec<ArchiveRow>,
    pub snapshots: SnapshotListing,
    pub next_row_id: u64,
    pub next_col_id: u64,
    pub next_version: Version,
    pub primary_key: Option<Vec<String>>,
    pub immutable_key: bool,
    pub column_match_policy: ColumnMatchPolicy,
}

/// A durable backend for one archive's state. Implementations own the
/// all-or-nothing save semantics; `save` either fully replaces the
/// persisted state or leaves the previous state untouched.
pub trait Store: Send + Sync {
    fn save(&mut self, state: &ArchiveState) -> Result<()>;
    fn load(&self) -> Result<Option<ArchiveState>>;
}

/// A store that never touches disk. Useful for tests and archives whose
/// lifetime does not outlive the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Option<ArchiveState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { state: None }
    }
}

impl Store for MemoryStore {
    fn save(&mut self, state: &ArchiveState) -> Result<()> {
        self.state = Some(state.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<ArchiveState>> {
        Ok(self.state.clone())
    }
}

/// A directory-backed store. Schema and snapshot metadata live in
/// `metadata.dat`; row histories live in `rows.dat` as newline-delimited
/// JSON records, one per row (spec.md §6). Both files carry a trailing
/// CRC32 of their own contents and are written through a staging file
/// that is renamed into place, so a reader never observes a half-written
/// file.
pub struct FileStore {
    dir: PathBuf,
}

const METADATA_FILE: &str = "metadata.dat";
const ROWS_FILE: &str = "rows.dat";

impl FileStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn write_checked(&self, name: &str, payload: &[u8]) -> Result<()> {
        let mut hasher = Hasher::new();
        hasher.update(payload);
        let checksum = hasher.finalize();

        let staging_path = self.dir.join(format!("{name}.tmp"));
        let mut staging = File::create(&staging_path)?;
        staging.write_all(&(payload.len() as u64).to_le_bytes())?;
        staging.write_all(payload)?;
        staging.write_all(&checksum.to_le_bytes())?;
        staging.sync_all()?;
        drop(staging);

        fs::rename(&staging_path, self.dir.join(name))?;
        Ok(())
    }

    fn read_checked(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        let mut buf = Vec::new();
        File::open(&path)?.read_to_end(&mut buf)?;
        if buf.len() < 12 {
            return Err(HistoryError::Integrity(format!("{name} is truncated")));
        }
        let (len_bytes, rest) = buf.split_at(8);
        let len = u64::from_le_bytes(len_bytes.try_into().unwrap()) as usize;
        if rest.len() != len + 4 {
            return Err(HistoryError::Integrity(format!("{name} length header does not match file size")));
        }
        let (payload, checksum_bytes) = rest.split_at(len);
        let stored_checksum = u32::from_le_bytes(checksum_bytes.try_into().unwrap());

        let mut hasher = Hasher::new();
        hasher.update(payload);
        if hasher.finalize() != stored_checksum {
            return Err(HistoryError::Integrity(format!("{name} failed its checksum")));
        }
        Ok(Some(payload.to_vec()))
    }
}

#[derive(Serialize, Deserialize)]
struct Metadata {
    schema: Vec<ArchiveColumn>,
    snapshots: SnapshotListing,
    next_row_id: u64,
    next_col_id: u64,
    next_version: Version,
    primary_key: Option<Vec<String>>,
    immutable_key: bool,
    column_match_policy: ColumnMatchPolicy,
}

impl Store for FileStore {
    fn save(&mut self, state: &ArchiveState) -> Result<()> {
        let metadata = Metadata {
            schema: state.columns.clone(),
            snapshots: state.snapshots.clone(),
            next_row_id: state.next_row_id,
            next_col_id: state.next_col_id,
            next_version: state.next_version,
            primary_key: state.primary_key.clone(),
            immutable_key: state.immutable_key,
            column_match_policy: state.column_match_policy,
        };
        let metadata_bytes = serde_json::to_vec(&metadata)?;

        let mut rows_bytes = Vec::new();
        for row in &state.rows {
            serde_json::to_writer(&mut rows_bytes, &crate::serialize::encode_row(row))
                .map_err(|e| HistoryError::Serialization(e.to_string()))?;
            rows_bytes.push(b'\n');
        }

        // Write rows first: a crash between the two leaves the previous
        // (still self-consistent) metadata pointing at a rows file that
        // is at worst ahead of what it describes, never behind.
        self.write_checked(ROWS_FILE, &rows_bytes)?;
        self.write_checked(METADATA_FILE, &metadata_bytes)?;
        Ok(())
    }

    fn load(&self) -> Result<Option<ArchiveState>> {
        let metadata_bytes = match self.read_checked(METADATA_FILE)? {
            Some(b) => b,
            None => return Ok(None),
        };
        let metadata: Metadata = serde_json::from_slice(&metadata_bytes)?;

        let rows_bytes = self.read_checked(ROWS_FILE)?.unwrap_or_default();
        let mut rows = Vec::new();
        for line in rows_bytes.split(|&b| b == b'\n') {
            if line.is_empty() {
                continue;
            }
            let value: serde_json::Value = serde_json::from_slice(line)?;
            rows.push(crate::serialize::decode_row(&value)?);
        }

        let mut schema = Schema::new();
        for column in metadata.schema {
            schema.restore_column(column);
        }
        schema.set_next_col_id(metadata.next_col_id);

        Ok(Some(ArchiveState {
            columns: schema.columns().to_vec(),
            rows,
            snapshots: metadata.snapshots,
            next_row_id: metadata.next_row_id,
            next_col_id: metadata.next_col_id,
            next_version: metadata.next_version,
            primary_key: metadata.primary_key,
            immutable_key: metadata.immutable_key,
            column_match_policy: metadata.column_match_policy,
        }))
    }
}
