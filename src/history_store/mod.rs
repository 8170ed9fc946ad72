//! History store module
//!
//! Durable persistence for the monitor:
//! - `HistoryStore`: per-board current snapshot plus an append-only
//!   history log, with board-granular locking and an atomic commit
//! - replay: snapshot reconstruction at any past history point
//!
//! On-disk layout, one directory per board:
//!
//! ```text
//! <data_dir>/boards/<board_id>/history.jsonl   one HistoryEntry per line
//! <data_dir>/boards/<board_id>/current.json    CurrentRecord { seq, snapshot }
//! <data_dir>/boards/<board_id>/board.lock      cross-process advisory lock
//! ```

mod replay;
mod store;

pub use replay::{apply_change_set, HistoryPoint, ReconstructionError};
pub use store::{HistoryQuery, HistoryStore, StoreConfig, StoreError, StoreResult, DATA_DIR_ENV};
