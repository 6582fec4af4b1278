//! Construction-time configuration for the validator and its storage backend.
//!
//! Configuration is plain data: it is read once (from defaults, JSON or the
//! command line), validated, and handed to [`crate::backend::open_store`].
//! Nothing here is mutable after the backend is built.
//!
//! # JSON Configuration
//!
//! ```no_run
//! use promo_quorum::config::ValidatorConfig;
//!
//! # fn main() -> promo_quorum::Result<()> {
//! let config = ValidatorConfig::from_json_str(r#"{
//!     "storage": "sqlite",
//!     "source_paths": ["data/couponbase1", "data/couponbase2", "data/couponbase3"],
//!     "sqlite": { "database_path": "data/promo_codes.db", "create_indexes": true }
//! }"#)?;
//! let store = promo_quorum::backend::open_store(&config)?;
//! # Ok(())
//! # }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use serde::{Deserialize, Serialize};

use crate::backend::source_id::SOURCE_COUNT;
use crate::utils::progress_report::ProgressReportFn;
use crate::{PromoError, Result};

/// Read buffer used when streaming a source file (1MB).
pub const READER_BUFFER_SIZE: usize = 1024 * 1024;

/// Lines buffered between the reader and the workers.
pub const WORK_QUEUE_CAPACITY: usize = 200_000;

/// Expected number of distinct codes per source file.
pub const INITIAL_SET_CAPACITY: usize = 10_000_000;

/// Pipeline workers started per available core.
pub const WORKERS_PER_CORE: usize = 2;

/// Default number of inserts per SQLite transaction.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

pub const DEFAULT_DATABASE_PATH: &str = "promo_codes.db";

/// Which storage backend answers membership queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// In-memory sets rebuilt from the source files on every start.
    #[default]
    Memory,
    /// SQLite database populated once and reused across restarts.
    Sqlite,
}

/// Tuning knobs for the in-memory ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Buffer size of the file reader
    pub reader_buffer_size: usize,
    /// Capacity of the bounded queue between reader and workers
    pub queue_capacity: usize,
    /// Pre-sized capacity of the merged set
    pub initial_capacity: usize,
    /// Workers per available core
    pub workers_per_core: usize,
    /// Lower bound on the worker count
    pub min_workers: usize,

    /// Progress callback (not serialized)
    #[serde(skip)]
    pub progress: Option<ProgressReportFn>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            reader_buffer_size: READER_BUFFER_SIZE,
            queue_capacity: WORK_QUEUE_CAPACITY,
            initial_capacity: INITIAL_SET_CAPACITY,
            workers_per_core: WORKERS_PER_CORE,
            min_workers: 2,
            progress: None,
        }
    }
}

impl PipelineOptions {
    /// Number of worker threads to start: `workers_per_core` times the
    /// available parallelism, never fewer than `min_workers` (and never zero).
    pub fn worker_count(&self) -> usize {
        (available_cores() * self.workers_per_core).max(self.min_workers).max(1)
    }
}

/// Settings for the SQLite backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Path of the database file; parent directories are created on open
    pub database_path: PathBuf,
    /// Inserts per committed transaction during the initial load; 0 selects the default
    pub batch_size: usize,
    /// Size of the read-connection pool; 0 selects the number of available cores
    pub worker_count: usize,
    /// Build a secondary index per table after the bulk load
    pub create_indexes: bool,

    /// Progress callback for the bulk load (not serialized)
    #[serde(skip)]
    pub progress: Option<ProgressReportFn>,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        SqliteConfig {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            batch_size: DEFAULT_BATCH_SIZE,
            worker_count: 0,
            create_indexes: false,
            progress: None,
        }
    }
}

impl SqliteConfig {
    pub fn effective_batch_size(&self) -> usize {
        if self.batch_size == 0 { DEFAULT_BATCH_SIZE } else { self.batch_size }
    }

    pub fn effective_worker_count(&self) -> usize {
        if self.worker_count == 0 { available_cores() } else { self.worker_count }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Backend selection
    pub storage: StorageKind,
    /// One file per source, in source order
    pub source_paths: Vec<PathBuf>,
    /// In-memory pipeline tuning
    pub pipeline: PipelineOptions,
    /// SQLite backend settings
    pub sqlite: SqliteConfig,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        ValidatorConfig {
            storage: StorageKind::Memory,
            source_paths: (1..=SOURCE_COUNT)
                .map(|n| PathBuf::from(format!("promofiles/couponbase{}", n)))
                .collect(),
            pipeline: PipelineOptions::default(),
            sqlite: SqliteConfig::default(),
        }
    }
}

impl ValidatorConfig {
    /// Builds a configuration for the given backend and source files, all
    /// other settings at their defaults.
    pub fn new<P: AsRef<Path>>(storage: StorageKind, source_paths: &[P]) -> Self {
        ValidatorConfig {
            storage,
            source_paths: source_paths.iter().map(|p| p.as_ref().to_path_buf()).collect(),
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ValidatorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| PromoError::file_io(path, e))?;
        Self::from_json_str(&json)
    }

    /// Checks the settings that would otherwise surface as a half-built backend.
    pub fn validate(&self) -> Result<()> {
        if self.source_paths.len() != SOURCE_COUNT {
            return Err(PromoError::invalid_parameter(format!(
                "Expected {} source paths, got {}",
                SOURCE_COUNT,
                self.source_paths.len()
            )));
        }
        if let Some(n) = self.source_paths.iter().position(|p| p.as_os_str().is_empty()) {
            return Err(PromoError::invalid_parameter(format!("Source path {} is empty", n + 1)));
        }
        if self.pipeline.queue_capacity == 0 {
            return Err(PromoError::invalid_parameter("Pipeline queue capacity must be positive"));
        }
        if self.pipeline.reader_buffer_size == 0 {
            return Err(PromoError::invalid_parameter("Reader buffer size must be positive"));
        }
        if self.storage == StorageKind::Sqlite && self.sqlite.database_path.as_os_str().is_empty() {
            return Err(PromoError::invalid_parameter("Database path is empty"));
        }
        Ok(())
    }
}

fn available_cores() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ValidatorConfig::default();
        assert_eq!(config.storage, StorageKind::Memory);
        assert_eq!(config.source_paths.len(), SOURCE_COUNT);
        assert_eq!(config.source_paths[2], PathBuf::from("promofiles/couponbase3"));
        assert_eq!(config.sqlite.batch_size, DEFAULT_BATCH_SIZE);
        assert!(config.pipeline.worker_count() >= 2);
        config.validate().unwrap();
    }

    #[test]
    fn test_json_partial_override() {
        let config = ValidatorConfig::from_json_str(
            r#"{"storage":"sqlite","sqlite":{"database_path":"db/codes.db","batch_size":0,"create_indexes":true}}"#,
        )
        .unwrap();
        assert_eq!(config.storage, StorageKind::Sqlite);
        assert_eq!(config.sqlite.database_path, PathBuf::from("db/codes.db"));
        assert_eq!(config.sqlite.effective_batch_size(), DEFAULT_BATCH_SIZE);
        assert!(config.sqlite.create_indexes);
        assert!(config.sqlite.effective_worker_count() >= 1);
        assert_eq!(config.pipeline.queue_capacity, WORK_QUEUE_CAPACITY);
    }

    #[test]
    fn test_rejects_wrong_source_count() {
        let err = ValidatorConfig::from_json_str(r#"{"source_paths":["a","b"]}"#).unwrap_err();
        assert!(matches!(err, PromoError::InvalidParameter { .. }), "{}", err);
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = ValidatorConfig::from_json_str("{storage:").unwrap_err();
        assert!(matches!(err, PromoError::ParserError { .. }));
    }
}
