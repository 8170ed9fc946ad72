//! Change model
//!
//! A `ChangeSet` is the structured diff between two consecutive snapshots
//! of the same board: cards added, removed, changed, and moved. Change
//! sets are produced once by the diff engine and are immutable afterwards;
//! the history store persists them verbatim and reconstruction replays
//! them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::snapshot::{AttachmentSnapshot, CardSnapshot};

/// Old and new value of a single card field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange<T> {
    pub old: T,
    pub new: T,
}

impl<T> FieldChange<T> {
    pub fn new(old: T, new: T) -> Self {
        Self { old, new }
    }
}

/// A card's old and new placement (column plus position within it)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementChange {
    pub old_column_id: String,
    pub old_position: usize,
    pub new_column_id: String,
    pub new_position: usize,
}

/// Field-level diff for one changed card
///
/// Only fields that actually differ are populated. `column` is set when
/// the card changed columns alongside a content change (the tie-break
/// rule: such a card is reported here, never in `moved`); `position` is
/// set for a same-column reorder that accompanies a content change.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardFieldDiff {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<FieldChange<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<FieldChange<Option<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<FieldChange<Option<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<PlacementChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<FieldChange<usize>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments_added: Vec<AttachmentSnapshot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments_removed: Vec<AttachmentSnapshot>,
}

impl CardFieldDiff {
    /// True when a content field differs (title, description, link, or
    /// attachments). Placement-only differences do not count; those are
    /// reported as moves.
    pub fn has_content_change(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.link.is_some()
            || !self.attachments_added.is_empty()
            || !self.attachments_removed.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_content_change() && self.column.is_none() && self.position.is_none()
    }
}

/// A card present in the previous snapshot but absent in the current one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRemoved {
    pub card_id: String,
    pub title: String,
    pub column_id: String,
    pub position: usize,
}

/// A card present in both snapshots with at least one content field changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardChanged {
    pub card_id: String,
    /// Title as of the current snapshot, for display
    pub title: String,
    pub diff: CardFieldDiff,
}

/// A card whose placement changed while its content did not
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardMoved {
    pub card_id: String,
    pub title: String,
    #[serde(flatten)]
    pub placement: PlacementChange,
}

/// The diff between two consecutive snapshots of one board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    pub board_id: String,
    pub generated_at: DateTime<Utc>,
    /// True for the first-ever observation of a board. A first-run change
    /// set reports nothing (the baseline is established silently) but is
    /// distinguishable from a genuinely empty diff so consumers can
    /// suppress notification on first runs specifically.
    #[serde(default)]
    pub first_run: bool,
    /// Added cards carry their full snapshot so history replay can
    /// reinsert them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<CardSnapshot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<CardRemoved>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed: Vec<CardChanged>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub moved: Vec<CardMoved>,
}

impl ChangeSet {
    /// Change set for the first observation of a board
    pub fn baseline(board_id: String, generated_at: DateTime<Utc>) -> Self {
        Self {
            board_id,
            generated_at,
            first_run: true,
            added: Vec::new(),
            removed: Vec::new(),
            changed: Vec::new(),
            moved: Vec::new(),
        }
    }

    /// True iff all four collections are empty
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.changed.is_empty()
            && self.moved.is_empty()
    }

    /// Whether a notification consumer should fire for this change set:
    /// never on a first run, never on an empty diff.
    pub fn should_notify(&self) -> bool {
        !self.first_run && !self.is_empty()
    }

    /// Identifiers of every card this change set touches
    pub fn card_ids(&self) -> HashSet<&str> {
        self.added
            .iter()
            .map(|c| c.id.as_str())
            .chain(self.removed.iter().map(|c| c.card_id.as_str()))
            .chain(self.changed.iter().map(|c| c.card_id.as_str()))
            .chain(self.moved.iter().map(|c| c.card_id.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_is_empty_but_distinguishable() {
        let cs = ChangeSet::baseline("board-1".to_string(), Utc::now());
        assert!(cs.is_empty());
        assert!(cs.first_run);
        assert!(!cs.should_notify());

        let empty = ChangeSet {
            first_run: false,
            ..cs.clone()
        };
        assert!(empty.is_empty());
        assert!(!empty.should_notify());
        assert_ne!(cs.first_run, empty.first_run);
    }

    #[test]
    fn test_should_notify_requires_changes() {
        let mut cs = ChangeSet::baseline("board-1".to_string(), Utc::now());
        cs.first_run = false;
        assert!(!cs.should_notify());

        cs.removed.push(CardRemoved {
            card_id: "x".to_string(),
            title: "Card".to_string(),
            column_id: "c1".to_string(),
            position: 0,
        });
        assert!(cs.should_notify());
    }

    #[test]
    fn test_card_ids_spans_all_collections() {
        let mut cs = ChangeSet::baseline("board-1".to_string(), Utc::now());
        cs.first_run = false;
        cs.removed.push(CardRemoved {
            card_id: "a".to_string(),
            title: String::new(),
            column_id: "c1".to_string(),
            position: 0,
        });
        cs.changed.push(CardChanged {
            card_id: "b".to_string(),
            title: String::new(),
            diff: CardFieldDiff::default(),
        });
        cs.moved.push(CardMoved {
            card_id: "c".to_string(),
            title: String::new(),
            placement: PlacementChange {
                old_column_id: "c1".to_string(),
                old_position: 0,
                new_column_id: "c2".to_string(),
                new_position: 0,
            },
        });

        let ids = cs.card_ids();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains("a") && ids.contains("b") && ids.contains("c"));
    }

    #[test]
    fn test_change_set_serialization_round_trip() {
        let mut cs = ChangeSet::baseline("board-1".to_string(), Utc::now());
        cs.first_run = false;
        cs.changed.push(CardChanged {
            card_id: "x".to_string(),
            title: "Final".to_string(),
            diff: CardFieldDiff {
                title: Some(FieldChange::new("Draft".to_string(), "Final".to_string())),
                ..CardFieldDiff::default()
            },
        });

        let json = serde_json::to_string(&cs).unwrap();
        assert!(json.contains("\"boardId\":\"board-1\""));
        let parsed: ChangeSet = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cs);
    }
}
