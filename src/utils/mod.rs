//! Utility helpers

pub mod atomic;

pub use atomic::{atomic_write_json, cleanup_temp_files};
