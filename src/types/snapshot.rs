//! Immutable board snapshot model
//!
//! A `BoardSnapshot` is a complete capture of a board's state at one
//! instant: its columns, their cards, and each card's attachments.
//! Snapshots are validated on construction and never mutated afterwards;
//! the diff engine and the history store only ever read them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A board snapshot violates its structural invariants
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedSnapshotError {
    /// Two cards in the snapshot share the same identifier
    DuplicateCardId { card_id: String },
    /// Two columns in the snapshot share the same identifier
    DuplicateColumnId { column_id: String },
    /// A card references a column that is not present in the snapshot
    UnknownColumn { card_id: String, column_id: String },
}

impl std::fmt::Display for MalformedSnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedSnapshotError::DuplicateCardId { card_id } => {
                write!(f, "duplicate card id '{}'", card_id)
            }
            MalformedSnapshotError::DuplicateColumnId { column_id } => {
                write!(f, "duplicate column id '{}'", column_id)
            }
            MalformedSnapshotError::UnknownColumn { card_id, column_id } => {
                write!(
                    f,
                    "card '{}' references unknown column '{}'",
                    card_id, column_id
                )
            }
        }
    }
}

impl std::error::Error for MalformedSnapshotError {}

/// The upstream service emits `""` where it means "no description";
/// collapse it on the way in so stored and replayed snapshots agree.
fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// A file attached to a card
///
/// Attachment identity is the filename: the upstream service does not
/// expose a stable server-side id, so a same-named attachment in two
/// snapshots is treated as the same attachment regardless of size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentSnapshot {
    pub filename: String,
    /// File size in bytes, when the service reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Download reference for the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

/// One card within a column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSnapshot {
    /// Stable card identifier, unique within the snapshot
    pub id: String,
    pub title: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_string_as_none"
    )]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Identifier of the column that owns this card
    pub column_id: String,
    /// Position of the card within its column, starting at 0
    pub position: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentSnapshot>,
}

impl CardSnapshot {
    /// Description with the absent / empty-string distinction collapsed.
    ///
    /// The upstream service flips between `null` and `""` for cards that
    /// never had a description; treating them as equal is a deliberate
    /// diff policy. [`BoardSnapshot::normalize`] collapses the stored
    /// value itself, so on snapshots that went through the boundary this
    /// is the plain description; the method keeps the comparison correct
    /// for values built directly in memory.
    pub fn normalized_description(&self) -> Option<&str> {
        match self.description.as_deref() {
            None | Some("") => None,
            some => some,
        }
    }

    /// Attachment filenames as a set, for identity comparison
    pub fn attachment_names(&self) -> HashSet<&str> {
        self.attachments.iter().map(|a| a.filename.as_str()).collect()
    }
}

/// One column of a board, with its cards in display order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSnapshot {
    /// Stable column identifier, unique within the snapshot
    pub id: String,
    pub name: String,
    /// Ordinal position of the column on the board, starting at 0
    pub position: usize,
    #[serde(default)]
    pub cards: Vec<CardSnapshot>,
}

/// A complete, immutable capture of a board at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    pub board_id: String,
    pub name: String,
    pub columns: Vec<ColumnSnapshot>,
    #[serde(default = "Utc::now")]
    pub captured_at: DateTime<Utc>,
}

impl BoardSnapshot {
    /// Build a snapshot, normalizing it and enforcing the structural
    /// invariants: unique card ids, unique column ids, and every card's
    /// `column_id` referencing a column present in the snapshot.
    pub fn new(
        board_id: String,
        name: String,
        columns: Vec<ColumnSnapshot>,
        captured_at: DateTime<Utc>,
    ) -> Result<Self, MalformedSnapshotError> {
        let mut snapshot = Self {
            board_id,
            name,
            columns,
            captured_at,
        };
        snapshot.normalize();
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Put a snapshot into canonical form: columns and cards sorted by
    /// their reported positions and renumbered densely from 0, and
    /// empty-string descriptions collapsed to absent.
    ///
    /// The upstream service may report sparse or out-of-order positions.
    /// Replay rebuilds card order from positions alone, so structural
    /// equality between a stored snapshot and a replayed one holds only
    /// in canonical form; every snapshot entering the pipeline passes
    /// through here, either via [`BoardSnapshot::new`] or at the parse
    /// boundary.
    pub fn normalize(&mut self) {
        self.columns.sort_by_key(|c| c.position);
        for (column_position, column) in self.columns.iter_mut().enumerate() {
            column.position = column_position;
            column.cards.sort_by_key(|c| c.position);
            for (card_position, card) in column.cards.iter_mut().enumerate() {
                card.position = card_position;
                if card.description.as_deref() == Some("") {
                    card.description = None;
                }
            }
        }
    }

    /// Check the structural invariants on an already-built snapshot.
    ///
    /// Deserialization does not go through [`BoardSnapshot::new`], so
    /// anything read from an untrusted source must call
    /// [`BoardSnapshot::normalize`] and then this before the snapshot
    /// enters the pipeline.
    pub fn validate(&self) -> Result<(), MalformedSnapshotError> {
        let mut column_ids = HashSet::new();
        for column in &self.columns {
            if !column_ids.insert(column.id.as_str()) {
                return Err(MalformedSnapshotError::DuplicateColumnId {
                    column_id: column.id.clone(),
                });
            }
        }

        let mut card_ids = HashSet::new();
        for card in self.cards() {
            if !card_ids.insert(card.id.as_str()) {
                return Err(MalformedSnapshotError::DuplicateCardId {
                    card_id: card.id.clone(),
                });
            }
            if !column_ids.contains(card.column_id.as_str()) {
                return Err(MalformedSnapshotError::UnknownColumn {
                    card_id: card.id.clone(),
                    column_id: card.column_id.clone(),
                });
            }
        }

        Ok(())
    }

    /// Iterate over all cards on the board, column by column
    pub fn cards(&self) -> impl Iterator<Item = &CardSnapshot> {
        self.columns.iter().flat_map(|c| c.cards.iter())
    }

    /// Total number of cards on the board
    pub fn card_count(&self) -> usize {
        self.columns.iter().map(|c| c.cards.len()).sum()
    }

    /// Look up a column by id
    pub fn column(&self, column_id: &str) -> Option<&ColumnSnapshot> {
        self.columns.iter().find(|c| c.id == column_id)
    }
}
