//! Console rendering
//!
//! Thin presentation layer over the core types: prints change sets,
//! board state, board lists, and history to stdout. No logic beyond
//! formatting lives here; a notification collaborator would consume the
//! same `ChangeSet` through its `should_notify` signal.

use crate::types::{BoardSnapshot, CardFieldDiff, ChangeSet, HistoryEntry};

fn opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("(none)")
}

/// Print a change set the way the `check` command reports it.
pub fn render_change_set(change_set: &ChangeSet, card_count: usize) {
    if change_set.first_run {
        println!(
            "First check of board {}: baseline established with {} cards.",
            change_set.board_id, card_count
        );
        return;
    }
    if change_set.is_empty() {
        println!("No changes detected.");
        return;
    }

    if !change_set.added.is_empty() {
        println!("Added ({}):", change_set.added.len());
        for card in &change_set.added {
            println!("  + [{}] {} (column {})", card.id, card.title, card.column_id);
        }
    }
    if !change_set.removed.is_empty() {
        println!("Removed ({}):", change_set.removed.len());
        for card in &change_set.removed {
            println!(
                "  - [{}] {} (was in column {})",
                card.card_id, card.title, card.column_id
            );
        }
    }
    if !change_set.changed.is_empty() {
        println!("Changed ({}):", change_set.changed.len());
        for card in &change_set.changed {
            println!("  * [{}] {}", card.card_id, card.title);
            render_field_diff(&card.diff);
        }
    }
    if !change_set.moved.is_empty() {
        println!("Moved ({}):", change_set.moved.len());
        for card in &change_set.moved {
            println!(
                "  > [{}] {}: {}#{} -> {}#{}",
                card.card_id,
                card.title,
                card.placement.old_column_id,
                card.placement.old_position,
                card.placement.new_column_id,
                card.placement.new_position
            );
        }
    }
}

fn render_field_diff(diff: &CardFieldDiff) {
    if let Some(title) = &diff.title {
        println!("      title: '{}' -> '{}'", title.old, title.new);
    }
    if let Some(description) = &diff.description {
        println!(
            "      description: '{}' -> '{}'",
            opt(&description.old),
            opt(&description.new)
        );
    }
    if let Some(link) = &diff.link {
        println!("      link: {} -> {}", opt(&link.old), opt(&link.new));
    }
    if let Some(column) = &diff.column {
        println!(
            "      column: {}#{} -> {}#{}",
            column.old_column_id, column.old_position, column.new_column_id, column.new_position
        );
    }
    if let Some(position) = &diff.position {
        println!("      position: {} -> {}", position.old, position.new);
    }
    for attachment in &diff.attachments_added {
        println!("      attachment added: {}", attachment.filename);
    }
    for attachment in &diff.attachments_removed {
        println!("      attachment removed: {}", attachment.filename);
    }
}

/// Print a full board snapshot, column by column.
pub fn render_board(snapshot: &BoardSnapshot) {
    println!(
        "Board {} '{}' ({} cards, captured {})",
        snapshot.board_id,
        snapshot.name,
        snapshot.card_count(),
        snapshot.captured_at.to_rfc3339()
    );
    for column in &snapshot.columns {
        println!("  Column '{}' ({} cards)", column.name, column.cards.len());
        for card in &column.cards {
            println!("    [{}] {}", card.id, card.title);
            if let Some(description) = card.normalized_description() {
                println!("        {}", description);
            }
            if let Some(link) = &card.link {
                println!("        link: {}", link);
            }
            for attachment in &card.attachments {
                match attachment.size {
                    Some(size) => {
                        println!("        attachment: {} ({} bytes)", attachment.filename, size)
                    }
                    None => println!("        attachment: {}", attachment.filename),
                }
            }
        }
    }
}

/// Print the board list for the `list` command.
pub fn render_board_list(boards: &[(String, BoardSnapshot)]) {
    if boards.is_empty() {
        println!("No boards have been checked yet.");
        return;
    }
    println!("{:<28} {:<24} {:>6}  last checked", "BOARD", "NAME", "CARDS");
    for (board_id, snapshot) in boards {
        println!(
            "{:<28} {:<24} {:>6}  {}",
            board_id,
            snapshot.name,
            snapshot.card_count(),
            snapshot.captured_at.to_rfc3339()
        );
    }
}

/// Print history entries for the `history` command.
pub fn render_history(entries: &[HistoryEntry]) {
    if entries.is_empty() {
        println!("No matching history entries.");
        return;
    }
    for entry in entries {
        let cs = &entry.change_set;
        let summary = if cs.first_run {
            "baseline".to_string()
        } else if cs.is_empty() {
            "no changes".to_string()
        } else {
            format!(
                "{} added, {} removed, {} changed, {} moved",
                cs.added.len(),
                cs.removed.len(),
                cs.changed.len(),
                cs.moved.len()
            )
        };
        println!("#{:<5} {}  {}", entry.seq, entry.timestamp.to_rfc3339(), summary);
        if !cs.is_empty() {
            render_change_set(cs, 0);
        }
    }
}
