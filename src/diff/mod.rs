//! Diff engine
//!
//! Pure comparison of two board snapshots into a [`ChangeSet`]. Card
//! identity is the card id, never content or position. The engine cannot
//! fail on well-formed snapshots; it only ever returns a change set,
//! possibly an empty one.
//!
//! Field comparison rules:
//! - title and link compare by plain equality
//! - description treats absent and empty string as equal
//! - attachments compare as filename sets; a same-named attachment with a
//!   different size is the same attachment (sizes are untracked)
//! - placement is the (column, position) pair; a placement-only change is
//!   a move, while a placement change alongside any content change folds
//!   into that card's field diff (a card never appears in two collections)

use std::collections::HashMap;

use crate::types::{
    BoardSnapshot, CardChanged, CardFieldDiff, CardMoved, CardRemoved, CardSnapshot, ChangeSet,
    FieldChange, PlacementChange,
};

/// A card plus its (column position, card position) sort key
struct Located<'a> {
    card: &'a CardSnapshot,
    key: (usize, usize),
}

/// Index a snapshot's cards by id, remembering each card's placement for
/// deterministic output ordering.
fn index_cards(snapshot: &BoardSnapshot) -> HashMap<&str, Located<'_>> {
    let mut index = HashMap::with_capacity(snapshot.card_count());
    for column in &snapshot.columns {
        for card in &column.cards {
            index.insert(
                card.id.as_str(),
                Located {
                    card,
                    key: (column.position, card.position),
                },
            );
        }
    }
    index
}

/// Field-level diff of one card matched across both snapshots.
///
/// Returns `None` when nothing differs.
fn diff_card(old: &CardSnapshot, new: &CardSnapshot) -> Option<CardFieldDiff> {
    let mut diff = CardFieldDiff::default();

    if old.title != new.title {
        diff.title = Some(FieldChange::new(old.title.clone(), new.title.clone()));
    }
    if old.normalized_description() != new.normalized_description() {
        diff.description = Some(FieldChange::new(
            old.normalized_description().map(String::from),
            new.normalized_description().map(String::from),
        ));
    }
    if old.link != new.link {
        diff.link = Some(FieldChange::new(old.link.clone(), new.link.clone()));
    }

    let old_names = old.attachment_names();
    let new_names = new.attachment_names();
    diff.attachments_added = new
        .attachments
        .iter()
        .filter(|a| !old_names.contains(a.filename.as_str()))
        .cloned()
        .collect();
    diff.attachments_removed = old
        .attachments
        .iter()
        .filter(|a| !new_names.contains(a.filename.as_str()))
        .cloned()
        .collect();

    let placement_changed = old.column_id != new.column_id || old.position != new.position;
    if placement_changed {
        if old.column_id != new.column_id {
            diff.column = Some(PlacementChange {
                old_column_id: old.column_id.clone(),
                old_position: old.position,
                new_column_id: new.column_id.clone(),
                new_position: new.position,
            });
        } else {
            diff.position = Some(FieldChange::new(old.position, new.position));
        }
    }

    if diff.is_empty() {
        None
    } else {
        Some(diff)
    }
}

/// Compute the change set between the stored previous snapshot and the
/// freshly fetched current one.
///
/// `previous` is `None` on the first-ever observation of a board; the
/// result is then the silent baseline change set (no adds, removes, or
/// changes reported) flagged as `first_run`.
pub fn compute_changes(previous: Option<&BoardSnapshot>, current: &BoardSnapshot) -> ChangeSet {
    let mut change_set = ChangeSet::baseline(current.board_id.clone(), current.captured_at);

    let previous = match previous {
        Some(previous) => previous,
        None => return change_set,
    };
    change_set.first_run = false;

    let old_index = index_cards(previous);
    let new_index = index_cards(current);

    // Keyed entries so each collection can be ordered by (column
    // position, card position) independent of traversal order.
    let mut added: Vec<((usize, usize), CardSnapshot)> = Vec::new();
    let mut removed: Vec<((usize, usize), CardRemoved)> = Vec::new();
    let mut changed: Vec<((usize, usize), CardChanged)> = Vec::new();
    let mut moved: Vec<((usize, usize), CardMoved)> = Vec::new();

    for (id, new_loc) in &new_index {
        match old_index.get(id) {
            None => added.push((new_loc.key, new_loc.card.clone())),
            Some(old_loc) => {
                let Some(diff) = diff_card(old_loc.card, new_loc.card) else {
                    continue;
                };
                if diff.has_content_change() {
                    changed.push((
                        new_loc.key,
                        CardChanged {
                            card_id: new_loc.card.id.clone(),
                            title: new_loc.card.title.clone(),
                            diff,
                        },
                    ));
                } else {
                    // Placement-only difference
                    moved.push((
                        new_loc.key,
                        CardMoved {
                            card_id: new_loc.card.id.clone(),
                            title: new_loc.card.title.clone(),
                            placement: PlacementChange {
                                old_column_id: old_loc.card.column_id.clone(),
                                old_position: old_loc.card.position,
                                new_column_id: new_loc.card.column_id.clone(),
                                new_position: new_loc.card.position,
                            },
                        },
                    ));
                }
            }
        }
    }

    for (id, old_loc) in &old_index {
        if !new_index.contains_key(id) {
            removed.push((
                old_loc.key,
                CardRemoved {
                    card_id: old_loc.card.id.clone(),
                    title: old_loc.card.title.clone(),
                    column_id: old_loc.card.column_id.clone(),
                    position: old_loc.card.position,
                },
            ));
        }
    }

    added.sort_by_key(|(key, _)| *key);
    removed.sort_by_key(|(key, _)| *key);
    changed.sort_by_key(|(key, _)| *key);
    moved.sort_by_key(|(key, _)| *key);

    change_set.added = added.into_iter().map(|(_, e)| e).collect();
    change_set.removed = removed.into_iter().map(|(_, e)| e).collect();
    change_set.changed = changed.into_iter().map(|(_, e)| e).collect();
    change_set.moved = moved.into_iter().map(|(_, e)| e).collect();
    change_set
}
