//! History store
//!
//! Durable storage for each monitored board: one append-only history log
//! (`history.jsonl`, one [`HistoryEntry`] per line) and one materialized
//! current snapshot (`current.json`).
//!
//! The history append is the atomic commit point. `current.json` is a
//! materialization written after the append; if a crash lands between
//! the two writes, `load_current` notices the stale pointer and rebuilds
//! it by replaying the log, so both effects of a commit become visible
//! together or not at all.

use std::collections::HashMap;
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use log::{debug, warn};

use crate::types::{BoardSnapshot, ChangeSet, ColumnInfo, CurrentRecord, HistoryEntry};
use crate::utils::{atomic_write_json, cleanup_temp_files};

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "TASKCARDS_DATA_DIR";

/// Configuration for the history store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root of the on-disk layout
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let data_dir = env::var(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));
        Self { data_dir }
    }
}

impl StoreConfig {
    /// Config rooted at a specific data directory
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory holding one subdirectory per board
    pub fn boards_dir(&self) -> PathBuf {
        self.data_dir.join("boards")
    }

    pub fn board_dir(&self, board_id: &str) -> PathBuf {
        self.boards_dir().join(board_id)
    }

    /// Append-only history log for a board
    pub fn history_path(&self, board_id: &str) -> PathBuf {
        self.board_dir(board_id).join("history.jsonl")
    }

    /// Materialized current snapshot for a board
    pub fn current_path(&self, board_id: &str) -> PathBuf {
        self.board_dir(board_id).join("current.json")
    }

    /// Advisory lock file for a board
    pub fn lock_path(&self, board_id: &str) -> PathBuf {
        self.board_dir(board_id).join("board.lock")
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence failures
#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Json(serde_json::Error),
    /// A history log or current record could not be interpreted
    Corrupted(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "IO error: {}", e),
            StoreError::Json(e) => write!(f, "JSON error: {}", e),
            StoreError::Corrupted(msg) => write!(f, "corrupted store: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Json(e)
    }
}

/// Conjunctive filters for history queries
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    /// Keep entries with `timestamp >= since`
    pub since: Option<DateTime<Utc>>,
    /// Keep entries with `timestamp <= until`
    pub until: Option<DateTime<Utc>>,
    /// Keep entries whose change set touches this card
    pub card_id: Option<String>,
    /// Keep only the most recent `limit` entries after filtering
    pub limit: Option<usize>,
}

impl HistoryQuery {
    fn matches(&self, entry: &HistoryEntry) -> bool {
        if let Some(since) = self.since {
            if entry.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if entry.timestamp > until {
                return false;
            }
        }
        if let Some(card_id) = &self.card_id {
            if !entry.change_set.card_ids().contains(card_id.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Durable, per-board history store
pub struct HistoryStore {
    config: StoreConfig,
    /// One mutex per board; commit and load serialize at board
    /// granularity, boards never block each other.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Mutex guarding one board's files within this process.
    ///
    /// The check pipeline holds this across its load-diff-commit sequence
    /// so two overlapping checks of the same board cannot both diff
    /// against the same stale current snapshot. Cross-process exclusion
    /// comes from [`HistoryStore::lock_board_dir`]; callers take the
    /// mutex first, then the file lock.
    pub fn board_lock(&self, board_id: &str) -> Arc<Mutex<()>> {
        let mut locks = lock_unpoisoned(&self.locks);
        locks
            .entry(board_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Exclusive advisory lock on a board's directory, blocking until it
    /// is acquired.
    ///
    /// Concurrent invocations of the binary serialize on an flock held
    /// on `board.lock` for the duration of a load, a commit, or a whole
    /// check pipeline. The OS drops the lock with the returned handle,
    /// including when the holding process dies, so a leftover lock file
    /// is never stale.
    pub(crate) fn lock_board_dir(&self, board_id: &str) -> StoreResult<File> {
        let board_dir = self.config.board_dir(board_id);
        fs::create_dir_all(&board_dir)?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.config.lock_path(board_id))?;
        file.lock_exclusive()?;
        Ok(file)
    }

    /// Load all history entries of a board in sequence order.
    ///
    /// Returns an empty vector for a board with no history.
    pub fn load_entries(&self, board_id: &str) -> StoreResult<Vec<HistoryEntry>> {
        let path = self.config.history_path(board_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut entries = Vec::new();
        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = HistoryEntry::from_json_line(&line).map_err(|e| {
                StoreError::Corrupted(format!(
                    "{}: line {}: {}",
                    path.display(),
                    line_num + 1,
                    e
                ))
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// The stored current snapshot of a board, or `None` if the board has
    /// never been committed.
    pub fn load_current(&self, board_id: &str) -> StoreResult<Option<BoardSnapshot>> {
        let lock = self.board_lock(board_id);
        let _guard = lock_unpoisoned(&lock);
        let _dir_lock = self.lock_board_dir(board_id)?;
        self.load_current_locked(board_id)
    }

    /// `load_current` body; caller must hold the board locks.
    pub(crate) fn load_current_locked(&self, board_id: &str) -> StoreResult<Option<BoardSnapshot>> {
        let entries = self.load_entries(board_id)?;
        let Some(last) = entries.last() else {
            return Ok(None);
        };

        let current_path = self.config.current_path(board_id);
        if current_path.exists() {
            match serde_json::from_str::<CurrentRecord>(&fs::read_to_string(&current_path)?) {
                Ok(record) if record.seq == last.seq => return Ok(Some(record.snapshot)),
                Ok(record) => {
                    warn!(
                        "board {}: current pointer at seq {} trails history at seq {}, repairing",
                        board_id, record.seq, last.seq
                    );
                }
                Err(e) => {
                    warn!("board {}: unreadable current pointer ({}), repairing", board_id, e);
                }
            }
        } else {
            warn!("board {}: missing current pointer, repairing from history", board_id);
        }

        // Crash landed between the history append and the pointer write;
        // the log is the source of truth, so replay it to the tail.
        let snapshot = super::replay::replay_entries(&entries, last.seq).ok_or_else(|| {
            StoreError::Corrupted(format!(
                "board {}: history has no baseline entry to replay from",
                board_id
            ))
        })?;
        atomic_write_json(
            &current_path,
            &CurrentRecord {
                seq: last.seq,
                snapshot: snapshot.clone(),
            },
        )?;
        Ok(Some(snapshot))
    }

    /// Atomically persist one check: append the history entry for
    /// `change_set` and advance the board's current snapshot to
    /// `new_snapshot`.
    pub fn commit(
        &self,
        board_id: &str,
        new_snapshot: &BoardSnapshot,
        change_set: ChangeSet,
    ) -> StoreResult<HistoryEntry> {
        let lock = self.board_lock(board_id);
        let _guard = lock_unpoisoned(&lock);
        let _dir_lock = self.lock_board_dir(board_id)?;
        self.commit_locked(board_id, new_snapshot, change_set)
    }

    /// `commit` body; caller must hold the board locks.
    pub(crate) fn commit_locked(
        &self,
        board_id: &str,
        new_snapshot: &BoardSnapshot,
        change_set: ChangeSet,
    ) -> StoreResult<HistoryEntry> {
        let board_dir = self.config.board_dir(board_id);
        fs::create_dir_all(&board_dir)?;
        if let Ok(cleaned) = cleanup_temp_files(&board_dir) {
            if cleaned > 0 {
                debug!("board {}: removed {} stale temp file(s)", board_id, cleaned);
            }
        }

        let last_seq = self.load_entries(board_id)?.last().map(|e| e.seq).unwrap_or(0);
        let seq = last_seq + 1;

        let entry = HistoryEntry {
            board_id: board_id.to_string(),
            seq,
            timestamp: change_set.generated_at,
            change_set,
            board_name: new_snapshot.name.clone(),
            columns: ColumnInfo::layout_of(new_snapshot),
            baseline: (seq == 1).then(|| new_snapshot.clone()),
        };

        // Commit point: one appended, fsynced line.
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.config.history_path(board_id))?;
        writeln!(file, "{}", entry.to_json_line()?)?;
        file.sync_all()?;

        atomic_write_json(
            self.config.current_path(board_id),
            &CurrentRecord {
                seq,
                snapshot: new_snapshot.clone(),
            },
        )?;

        debug!("board {}: committed seq {}", board_id, seq);
        Ok(entry)
    }

    /// Query a board's history, filters conjunctive, ordered by sequence
    /// number ascending. With both a range and a limit, the filter applies
    /// first and the limit keeps the tail (the most recent entries).
    pub fn query(&self, board_id: &str, query: &HistoryQuery) -> StoreResult<Vec<HistoryEntry>> {
        let mut entries: Vec<HistoryEntry> = self
            .load_entries(board_id)?
            .into_iter()
            .filter(|e| query.matches(e))
            .collect();
        if let Some(limit) = query.limit {
            if entries.len() > limit {
                entries.drain(..entries.len() - limit);
            }
        }
        Ok(entries)
    }

    /// Every board with at least one committed snapshot, sorted by id
    pub fn list_boards(&self) -> StoreResult<Vec<String>> {
        let boards_dir = self.config.boards_dir();
        if !boards_dir.exists() {
            return Ok(Vec::new());
        }

        let mut boards = Vec::new();
        for entry in fs::read_dir(&boards_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let board_id = entry.file_name().to_string_lossy().to_string();
            if self.config.history_path(&board_id).exists() {
                boards.push(board_id);
            }
        }
        boards.sort();
        Ok(boards)
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
