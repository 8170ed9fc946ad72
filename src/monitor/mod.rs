//! Check pipeline
//!
//! One check of one board is a single sequential pipeline: load the
//! stored current snapshot, diff the fresh snapshot against it, commit
//! the change set. The board mutex and the board's on-disk flock are
//! both held across all three steps, so two overlapping checks of the
//! same board, whether threads in one process or separate invocations
//! of the binary, can never both diff against the same stale baseline
//! and double-append.

use log::{debug, info};

use crate::diff::compute_changes;
use crate::history_store::{HistoryStore, StoreResult};
use crate::types::{BoardSnapshot, HistoryEntry};

/// Run one check of `current` against the store, committing the result.
///
/// The caller provides a validated snapshot; on any error the store is
/// left exactly as it was (the commit is all-or-nothing and nothing else
/// mutates durable state).
pub fn run_check(store: &HistoryStore, current: &BoardSnapshot) -> StoreResult<HistoryEntry> {
    let board_id = current.board_id.as_str();
    let lock = store.board_lock(board_id);
    let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let _dir_lock = store.lock_board_dir(board_id)?;

    let previous = store.load_current_locked(board_id)?;
    match &previous {
        Some(p) => debug!("board {}: previous snapshot has {} cards", board_id, p.card_count()),
        None => debug!("board {}: no previous snapshot, first run", board_id),
    }

    let change_set = compute_changes(previous.as_ref(), current);
    let entry = store.commit_locked(board_id, current, change_set)?;

    if entry.change_set.first_run {
        info!(
            "board {}: baseline established with {} cards (seq {})",
            board_id,
            current.card_count(),
            entry.seq
        );
    } else {
        info!(
            "board {}: {} added, {} removed, {} changed, {} moved (seq {})",
            board_id,
            entry.change_set.added.len(),
            entry.change_set.removed.len(),
            entry.change_set.changed.len(),
            entry.change_set.moved.len(),
            entry.seq
        );
    }

    Ok(entry)
}
