//! Storage backends for files, views and saved zooms

pub mod memory;
pub mod sqlite;

use std::fmt::Display;
use pv_core::CoreError;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub(crate) fn storage_error(context: &str, error: impl Display) -> CoreError {
    CoreError::Storage(format!("{context}: {error}"))
}
