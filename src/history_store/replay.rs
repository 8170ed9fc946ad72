//! Snapshot reconstruction
//!
//! Rebuilds the full board state as of any past history point by
//! replaying stored change sets over the board's baseline snapshot.
//! This is an auditing path; the polling pipeline reads the
//! materialized current snapshot instead.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::types::{BoardSnapshot, CardSnapshot, ChangeSet, ColumnSnapshot, HistoryEntry};

use super::store::{lock_unpoisoned, HistoryStore, StoreError};

/// A point in a board's history: a sequence number or a wall-clock time
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HistoryPoint {
    Seq(u64),
    Time(DateTime<Utc>),
}

/// Reconstruction failures
#[derive(Debug)]
pub enum ReconstructionError {
    /// The board has no history at all
    NoHistory(String),
    Store(StoreError),
}

impl std::fmt::Display for ReconstructionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconstructionError::NoHistory(board_id) => {
                write!(f, "no history for board '{}'", board_id)
            }
            ReconstructionError::Store(e) => write!(f, "store error: {}", e),
        }
    }
}

impl std::error::Error for ReconstructionError {}

impl From<StoreError> for ReconstructionError {
    fn from(e: StoreError) -> Self {
        ReconstructionError::Store(e)
    }
}

/// Apply one change set to a card map keyed by card id.
///
/// Adds insert the embedded card, removals delete by id, moves update
/// placement, and field diffs rewrite the affected fields in place.
pub fn apply_change_set(cards: &mut HashMap<String, CardSnapshot>, change_set: &ChangeSet) {
    for removed in &change_set.removed {
        cards.remove(&removed.card_id);
    }

    for added in &change_set.added {
        cards.insert(added.id.clone(), added.clone());
    }

    for moved in &change_set.moved {
        if let Some(card) = cards.get_mut(&moved.card_id) {
            card.column_id = moved.placement.new_column_id.clone();
            card.position = moved.placement.new_position;
        }
    }

    for changed in &change_set.changed {
        let Some(card) = cards.get_mut(&changed.card_id) else {
            continue;
        };
        let diff = &changed.diff;
        if let Some(title) = &diff.title {
            card.title = title.new.clone();
        }
        if let Some(description) = &diff.description {
            card.description = description.new.clone();
        }
        if let Some(link) = &diff.link {
            card.link = link.new.clone();
        }
        if let Some(column) = &diff.column {
            card.column_id = column.new_column_id.clone();
            card.position = column.new_position;
        }
        if let Some(position) = &diff.position {
            card.position = position.new;
        }
        if !diff.attachments_removed.is_empty() {
            let gone: Vec<&str> = diff
                .attachments_removed
                .iter()
                .map(|a| a.filename.as_str())
                .collect();
            card.attachments
                .retain(|a| !gone.contains(&a.filename.as_str()));
        }
        for attachment in &diff.attachments_added {
            card.attachments.push(attachment.clone());
        }
    }
}

/// Assemble a board snapshot from a replayed card map and the column
/// layout recorded on the target entry.
fn assemble_board(entry: &HistoryEntry, cards: &HashMap<String, CardSnapshot>) -> BoardSnapshot {
    let mut columns: Vec<ColumnSnapshot> = entry
        .columns
        .iter()
        .map(|info| ColumnSnapshot {
            id: info.id.clone(),
            name: info.name.clone(),
            position: info.position,
            cards: Vec::new(),
        })
        .collect();
    columns.sort_by_key(|c| c.position);

    for card in cards.values() {
        if let Some(column) = columns.iter_mut().find(|c| c.id == card.column_id) {
            column.cards.push(card.clone());
        }
    }
    for column in &mut columns {
        column.cards.sort_by_key(|c| c.position);
    }

    BoardSnapshot {
        board_id: entry.board_id.clone(),
        name: entry.board_name.clone(),
        columns,
        captured_at: entry.timestamp,
    }
}

/// Replay `entries` up to and including `target_seq`.
///
/// Returns `None` when the entries within range contain no baseline to
/// start from (a log whose first entry is missing its embedded
/// snapshot).
pub(crate) fn replay_entries(entries: &[HistoryEntry], target_seq: u64) -> Option<BoardSnapshot> {
    let mut cards: HashMap<String, CardSnapshot> = HashMap::new();
    let mut seeded = false;
    let mut target: Option<&HistoryEntry> = None;

    for entry in entries.iter().filter(|e| e.seq <= target_seq) {
        if let Some(baseline) = &entry.baseline {
            cards = baseline
                .cards()
                .map(|c| (c.id.clone(), c.clone()))
                .collect();
            seeded = true;
        } else {
            apply_change_set(&mut cards, &entry.change_set);
        }
        target = Some(entry);
    }

    let entry = target?;
    seeded.then(|| assemble_board(entry, &cards))
}

impl HistoryStore {
    /// Rebuild the board state as it existed at `point`.
    ///
    /// A point preceding all history yields the empty board; a board
    /// with no history at all is a [`ReconstructionError::NoHistory`].
    pub fn reconstruct_at(
        &self,
        board_id: &str,
        point: HistoryPoint,
    ) -> Result<BoardSnapshot, ReconstructionError> {
        let lock = self.board_lock(board_id);
        let _guard = lock_unpoisoned(&lock);
        let _dir_lock = self.lock_board_dir(board_id)?;

        let entries = self.load_entries(board_id)?;
        let Some(first) = entries.first() else {
            return Err(ReconstructionError::NoHistory(board_id.to_string()));
        };

        let target_seq = match point {
            HistoryPoint::Seq(seq) => seq,
            HistoryPoint::Time(time) => entries
                .iter()
                .filter(|e| e.timestamp <= time)
                .map(|e| e.seq)
                .last()
                .unwrap_or(0),
        };

        if target_seq < first.seq {
            // Before anything was observed: the empty board.
            return Ok(BoardSnapshot {
                board_id: board_id.to_string(),
                name: first.board_name.clone(),
                columns: Vec::new(),
                captured_at: first.timestamp,
            });
        }

        replay_entries(&entries, target_seq).ok_or_else(|| {
            ReconstructionError::Store(StoreError::Corrupted(format!(
                "board {}: history has no baseline entry to replay from",
                board_id
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::compute_changes;
    use crate::history_store::store::StoreConfig;
    use crate::types::AttachmentSnapshot;
    use tempfile::TempDir;

    fn test_store() -> (HistoryStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = HistoryStore::with_config(StoreConfig::new(temp_dir.path()));
        (store, temp_dir)
    }

    fn card(id: &str, title: &str, column_id: &str, position: usize) -> CardSnapshot {
        CardSnapshot {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            link: None,
            column_id: column_id.to_string(),
            position,
            attachments: Vec::new(),
        }
    }

    fn board(columns: Vec<(&str, &str, Vec<CardSnapshot>)>) -> BoardSnapshot {
        BoardSnapshot::new(
            "b1".to_string(),
            "Test Board".to_string(),
            columns
                .into_iter()
                .enumerate()
                .map(|(position, (id, name, cards))| ColumnSnapshot {
                    id: id.to_string(),
                    name: name.to_string(),
                    position,
                    cards,
                })
                .collect(),
            Utc::now(),
        )
        .unwrap()
    }

    fn check(store: &HistoryStore, snapshot: &BoardSnapshot) {
        let previous = store.load_current("b1").unwrap();
        let change_set = compute_changes(previous.as_ref(), snapshot);
        store.commit("b1", snapshot, change_set).unwrap();
    }

    #[test]
    fn test_reconstruct_no_history_fails() {
        let (store, _dir) = test_store();
        let err = store.reconstruct_at("b1", HistoryPoint::Seq(1)).unwrap_err();
        assert!(matches!(err, ReconstructionError::NoHistory(_)));
    }

    #[test]
    fn test_reconstruct_before_history_is_empty_board() {
        let (store, _dir) = test_store();
        check(&store, &board(vec![("c1", "Todo", vec![card("x", "Task", "c1", 0)])]));

        let reconstructed = store.reconstruct_at("b1", HistoryPoint::Seq(0)).unwrap();
        assert!(reconstructed.columns.is_empty());
        assert_eq!(reconstructed.board_id, "b1");
    }

    #[test]
    fn test_reconstruct_latest_equals_stored_current() {
        let (store, _dir) = test_store();

        let v1 = board(vec![
            ("c1", "Todo", vec![card("x", "Draft", "c1", 0)]),
            ("c2", "Done", vec![]),
        ]);
        check(&store, &v1);

        // Rename, move another card in, attach a file.
        let mut renamed = card("x", "Final", "c1", 0);
        renamed.attachments = vec![AttachmentSnapshot {
            filename: "spec.pdf".to_string(),
            size: Some(64),
            download_url: None,
        }];
        let v2 = board(vec![
            ("c1", "Todo", vec![renamed.clone(), card("y", "Task 2", "c1", 1)]),
            ("c2", "Done", vec![]),
        ]);
        check(&store, &v2);

        // Move both cards to Done, drop the attachment.
        let mut done_x = renamed.clone();
        done_x.column_id = "c2".to_string();
        done_x.position = 0;
        done_x.attachments = Vec::new();
        let mut done_y = card("y", "Task 2", "c2", 1);
        done_y.description = Some("wrapped up".to_string());
        let v3 = board(vec![
            ("c1", "Todo", vec![]),
            ("c2", "Done", vec![done_x, done_y]),
        ]);
        check(&store, &v3);

        let current = store.load_current("b1").unwrap().unwrap();
        let replayed = store.reconstruct_at("b1", HistoryPoint::Seq(3)).unwrap();
        assert_eq!(replayed, current);
    }

    #[test]
    fn test_replay_matches_current_when_description_flips_empty_and_absent() {
        let (store, _dir) = test_store();

        // The service reports "" here and null on the next fetch.
        let mut drafted = card("x", "Task", "c1", 0);
        drafted.description = Some(String::new());
        check(&store, &board(vec![("c1", "Todo", vec![drafted])]));
        check(&store, &board(vec![("c1", "Todo", vec![card("x", "Task", "c1", 0)])]));

        // The flip is not a change, so the second entry is empty.
        let entries = store.load_entries("b1").unwrap();
        assert!(entries[1].change_set.is_empty());

        let current = store.load_current("b1").unwrap().unwrap();
        assert_eq!(current.cards().next().unwrap().description, None);
        let replayed = store.reconstruct_at("b1", HistoryPoint::Seq(2)).unwrap();
        assert_eq!(replayed, current);
    }

    #[test]
    fn test_replay_matches_current_for_out_of_order_input() {
        let (store, _dir) = test_store();

        // Cards arrive with sparse positions and in arbitrary vector
        // order; canonical form makes the stored and replayed snapshots
        // agree on one ordering.
        let v1 = BoardSnapshot::new(
            "b1".to_string(),
            "Test Board".to_string(),
            vec![ColumnSnapshot {
                id: "c1".to_string(),
                name: "Todo".to_string(),
                position: 0,
                cards: vec![card("b", "Second", "c1", 5), card("a", "First", "c1", 2)],
            }],
            Utc::now(),
        )
        .unwrap();
        check(&store, &v1);
        check(
            &store,
            &board(vec![(
                "c1",
                "Todo",
                vec![card("a", "First", "c1", 0), card("b", "Renamed", "c1", 1)],
            )]),
        );

        let current = store.load_current("b1").unwrap().unwrap();
        let cards: Vec<&str> = current.cards().map(|c| c.id.as_str()).collect();
        assert_eq!(cards, vec!["a", "b"]);
        let replayed = store.reconstruct_at("b1", HistoryPoint::Seq(2)).unwrap();
        assert_eq!(replayed, current);
    }

    #[test]
    fn test_reconstruct_intermediate_point() {
        let (store, _dir) = test_store();
        let v1 = board(vec![("c1", "Todo", vec![card("x", "Draft", "c1", 0)])]);
        check(&store, &v1);
        let v2 = board(vec![("c1", "Todo", vec![card("x", "Final", "c1", 0)])]);
        check(&store, &v2);

        let at_1 = store.reconstruct_at("b1", HistoryPoint::Seq(1)).unwrap();
        assert_eq!(at_1.cards().next().unwrap().title, "Draft");

        let at_2 = store.reconstruct_at("b1", HistoryPoint::Seq(2)).unwrap();
        assert_eq!(at_2.cards().next().unwrap().title, "Final");
    }

    #[test]
    fn test_reconstruct_by_timestamp() {
        let (store, _dir) = test_store();
        let v1 = board(vec![("c1", "Todo", vec![card("x", "Draft", "c1", 0)])]);
        check(&store, &v1);
        let v2 = board(vec![("c1", "Todo", vec![card("x", "Final", "c1", 0)])]);
        check(&store, &v2);

        let entries = store.load_entries("b1").unwrap();
        let at_first = store
            .reconstruct_at("b1", HistoryPoint::Time(entries[0].timestamp))
            .unwrap();
        assert_eq!(at_first.cards().next().unwrap().title, "Draft");

        let before_all = store
            .reconstruct_at(
                "b1",
                HistoryPoint::Time(entries[0].timestamp - chrono::Duration::days(1)),
            )
            .unwrap();
        assert!(before_all.columns.is_empty());
    }

    #[test]
    fn test_reconstruct_tracks_column_renames() {
        let (store, _dir) = test_store();
        let v1 = board(vec![("c1", "Todo", vec![card("x", "Task", "c1", 0)])]);
        check(&store, &v1);
        let v2 = board(vec![("c1", "Backlog", vec![card("x", "Task", "c1", 0)])]);
        check(&store, &v2);

        let at_2 = store.reconstruct_at("b1", HistoryPoint::Seq(2)).unwrap();
        assert_eq!(at_2.columns[0].name, "Backlog");
        let at_1 = store.reconstruct_at("b1", HistoryPoint::Seq(1)).unwrap();
        assert_eq!(at_1.columns[0].name, "Todo");
    }

    #[test]
    fn test_apply_change_set_handles_add_remove_move() {
        let mut cards: HashMap<String, CardSnapshot> = HashMap::new();
        cards.insert("x".to_string(), card("x", "Task", "c1", 0));
        cards.insert("y".to_string(), card("y", "Other", "c1", 1));

        let previous = board(vec![(
            "c1",
            "Todo",
            vec![card("x", "Task", "c1", 0), card("y", "Other", "c1", 1)],
        )]);
        let current = board(vec![
            ("c1", "Todo", vec![card("z", "Fresh", "c1", 0)]),
            ("c2", "Done", vec![card("x", "Task", "c2", 0)]),
        ]);
        let change_set = compute_changes(Some(&previous), &current);

        apply_change_set(&mut cards, &change_set);
        assert!(!cards.contains_key("y"));
        assert_eq!(cards["z"].title, "Fresh");
        assert_eq!(cards["x"].column_id, "c2");
    }
}
