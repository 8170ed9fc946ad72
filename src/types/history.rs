//! History model
//!
//! A `HistoryEntry` is one durably stored change set together with its
//! per-board sequence number and enough board context (name, column
//! layout, and for the first entry the baseline snapshot) for
//! reconstruction to replay the board state at any point.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::changes::ChangeSet;
use super::snapshot::{BoardSnapshot, ColumnSnapshot};

/// Column metadata as of one history point
///
/// Card diffs carry no column names or ordering, so each entry records
/// the post-change column layout for replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub id: String,
    pub name: String,
    pub position: usize,
}

impl ColumnInfo {
    pub fn from_column(column: &ColumnSnapshot) -> Self {
        Self {
            id: column.id.clone(),
            name: column.name.clone(),
            position: column.position,
        }
    }

    /// Layout of all columns of a snapshot
    pub fn layout_of(snapshot: &BoardSnapshot) -> Vec<Self> {
        snapshot.columns.iter().map(Self::from_column).collect()
    }
}

/// One line of a board's append-only history log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub board_id: String,
    /// Monotonic per-board sequence number, starting at 1
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub change_set: ChangeSet,
    /// Board display name as of this entry
    pub board_name: String,
    /// Post-change column layout as of this entry
    pub columns: Vec<ColumnInfo>,
    /// Full snapshot of the first observation; present only on the first
    /// entry of a board. Replay starts from it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<BoardSnapshot>,
}

impl HistoryEntry {
    /// Serialize to a single JSONL line
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from a JSONL line
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// The materialized "current pointer": the latest snapshot of a board
/// and the history sequence number it corresponds to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentRecord {
    pub seq: u64,
    pub snapshot: BoardSnapshot,
}
