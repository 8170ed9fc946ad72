//! Atomic file writes
//!
//! The history store's `current.json` is replaced, never edited in
//! place. The write goes to a `.tmp` sibling, is fsynced, and is then
//! renamed over the destination, so a crash leaves either the old file
//! or the new one, never a partial write.

use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
pub fn atomic_write_json<P, T>(path: P, value: &T) -> io::Result<()>
where
    P: AsRef<Path>,
    T: Serialize,
{
    let path = path.as_ref();
    let temp_path = path.with_extension("tmp");

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mut file = File::create(&temp_path)?;
    file.write_all(&json)?;
    file.sync_all()?;

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Remove `.tmp` leftovers from interrupted writes in `dir`.
///
/// Called when a board directory is opened, so a crash mid-write never
/// accumulates garbage.
pub fn cleanup_temp_files<P: AsRef<Path>>(dir: P) -> io::Result<usize> {
    let dir = dir.as_ref();
    let mut cleaned = 0;

    if !dir.exists() {
        return Ok(0);
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map(|e| e == "tmp").unwrap_or(false) {
            fs::remove_file(&path)?;
            cleaned += 1;
        }
    }

    Ok(cleaned)
}
