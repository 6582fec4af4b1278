// Storage backends answering per-source membership queries
//
// Two interchangeable implementations share the `CodeStore` contract: an
// in-memory set per source rebuilt on every start, and a SQLite database
// populated once and reused across restarts.

pub mod source_id;
pub mod memory_store;
pub mod schema;
pub mod sqlite_store;

pub use source_id::{SourceId, SOURCE_COUNT};
pub use memory_store::MemoryStore;
pub use sqlite_store::SqliteStore;

use crate::config::{StorageKind, ValidatorConfig};
use crate::Result;

/// Membership capability shared by every storage backend.
///
/// Implementations are read-only once constructed and safe to query from
/// many threads at once.
pub trait CodeStore: Send + Sync {
    /// Returns whether `code` is present in source `source_id` (1-based).
    ///
    /// # Errors
    ///
    /// Returns `InvalidSourceId` when `source_id` is outside `1..=SOURCE_COUNT`,
    /// and a storage error if the lookup itself fails.
    fn exists(&self, code: &str, source_id: u32) -> Result<bool>;

    /// Releases any resources held by the store. Calling it more than once is
    /// harmless.
    fn close(&self) -> Result<()>;
}

/// Builds the backend selected by `config`, loading source data as needed.
pub fn open_store(config: &ValidatorConfig) -> Result<Box<dyn CodeStore>> {
    config.validate()?;
    match config.storage {
        StorageKind::Memory => Ok(Box::new(MemoryStore::load(&config.source_paths, &config.pipeline)?)),
        StorageKind::Sqlite => Ok(Box::new(SqliteStore::open(&config.source_paths, &config.sqlite)?)),
    }
}
