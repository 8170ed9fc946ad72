//! Data types for the TaskCards monitor
//!
//! This module contains the immutable snapshot model, the change model
//! produced by the diff engine, and the persisted history model.

mod changes;
mod history;
mod snapshot;

pub use changes::{
    CardChanged, CardFieldDiff, CardMoved, CardRemoved, ChangeSet, FieldChange, PlacementChange,
};
pub use history::{ColumnInfo, CurrentRecord, HistoryEntry};
pub use snapshot::{
    AttachmentSnapshot, BoardSnapshot, CardSnapshot, ColumnSnapshot, MalformedSnapshotError,
};
