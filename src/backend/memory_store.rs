//! Volatile backend holding every source as an in-memory hash set.
//!
//! All three files are loaded in parallel at construction; lookups are plain
//! set membership checks.

use std::path::Path;
use std::time::Instant;

use log::*;

use crate::backend::CodeStore;
use crate::backend::source_id::{SourceId, SOURCE_COUNT};
use crate::config::PipelineOptions;
use crate::ingest::pipeline::{load_all_sources, CodeSet};
use crate::{PromoError, Result};

/// Volatile backend: one in-memory set per source.
///
/// The sets are built at construction and never modified afterwards, so
/// lookups take no locks.
#[derive(Debug)]
pub struct MemoryStore {
    sources: [CodeSet; SOURCE_COUNT],
}

impl MemoryStore {
    /// Loads all source files in parallel and builds the store.
    ///
    /// # Errors
    ///
    /// Fails with the first source (in source order) that could not be loaded.
    pub fn load<P: AsRef<Path> + Sync>(paths: &[P], options: &PipelineOptions) -> Result<Self> {
        let start = Instant::now();
        let sets = load_all_sources(paths, options)?;
        let store = Self::from_sets(sets)?;
        info!("In-memory promo store ready in {:?}", start.elapsed());
        Ok(store)
    }

    /// Builds a store from already collected sets, in source order.
    pub fn from_sets(sets: Vec<CodeSet>) -> Result<Self> {
        let count = sets.len();
        let sources: [CodeSet; SOURCE_COUNT] = sets.try_into().map_err(|_| {
            PromoError::invalid_parameter(format!("Expected {} code sets, got {}", SOURCE_COUNT, count))
        })?;
        Ok(MemoryStore { sources })
    }

    /// Number of distinct codes held for `source`.
    pub fn len(&self, source: SourceId) -> usize {
        self.sources[source.slot()].len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.iter().all(|set| set.is_empty())
    }
}

impl CodeStore for MemoryStore {
    fn exists(&self, code: &str, source_id: u32) -> Result<bool> {
        let source = SourceId::try_from(source_id)?;
        Ok(self.sources[source.slot()].contains(code))
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
