//! Archive configuration: how a new archive is keyed, how schema columns
//! are matched against incoming snapshots, and where its state lives.

use crate::schema::ColumnMatchPolicy;
use serde::{Deserialize, Serialize};

/// Options fixed at archive-creation time (spec.md §4.1, §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOptions {
    /// Column names forming the primary key. `None` means an un-keyed
    /// archive: rows are matched positionally and the merge engine treats
    /// every row's identity as "new" unless its document-provided row
    /// index reappears.
    pub primary_key: Option<Vec<String>>,

    /// How an incoming snapshot's columns are aligned to the existing
    /// schema.
    pub column_match_policy: ColumnMatchPolicy,

    /// Once a row is matched to an archive row, whether a change in its
    /// key value is a fatal `HistoryError::Schema` (`true`) or an allowed
    /// re-keying of that row (`false`, the default).
    pub immutable_key: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            primary_key: None,
            column_match_policy: ColumnMatchPolicy::default(),
            immutable_key: false,
        }
    }
}

impl CreateOptions {
    pub fn keyed(primary_key: Vec<String>) -> Self {
        Self { primary_key: Some(primary_key), ..Default::default() }
    }

    pub fn with_immutable_key(mut self, immutable_key: bool) -> Self {
        self.immutable_key = immutable_key;
        self
    }

    pub fn with_column_match_policy(mut self, policy: ColumnMatchPolicy) -> Self {
        self.column_match_policy = policy;
        self
    }

    pub fn is_keyed(&self) -> bool {
        self.primary_key.is_some()
    }
}
