//! TaskCards Monitor
//!
//! Periodically compares full snapshots of a TaskCards board against the
//! previously stored state, producing a structured change set and an
//! append-only, replayable change history per board.
//!
//! # Modules
//!
//! - `types`: Snapshot, change, and history models
//! - `diff`: Pure snapshot diff engine
//! - `history_store`: Durable per-board store with atomic commits and
//!   point-in-time reconstruction
//! - `monitor`: The load-diff-commit check pipeline
//! - `render`: Console output for the CLI
//! - `utils`: Atomic file-write helpers
//!
//! # Example
//!
//! ```no_run
//! use taskcards_monitor::history_store::{HistoryStore, StoreConfig};
//! use taskcards_monitor::monitor::run_check;
//! use taskcards_monitor::types::BoardSnapshot;
//!
//! fn check(snapshot: &BoardSnapshot) -> Result<(), Box<dyn std::error::Error>> {
//!     let store = HistoryStore::with_config(StoreConfig::new("data"));
//!     let entry = run_check(&store, snapshot)?;
//!     if entry.change_set.should_notify() {
//!         println!("{} cards changed", entry.change_set.changed.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod diff;
pub mod history_store;
pub mod monitor;
pub mod render;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use diff::compute_changes;
pub use history_store::{
    HistoryPoint, HistoryQuery, HistoryStore, ReconstructionError, StoreConfig, StoreError,
};
pub use monitor::run_check;
pub use types::{BoardSnapshot, ChangeSet, HistoryEntry, MalformedSnapshotError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
