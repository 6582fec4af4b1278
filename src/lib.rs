//! # promo_quorum - Quorum-Based Promo Code Validation
//!
//! This crate ingests large newline-delimited lists of opaque promo codes from
//! three independent sources, makes them queryable by exact-match membership,
//! and decides whether a code is valid by majority quorum: a code is honored
//! when at least two of the three lists contain it.
//!
//! ## Features
//!
//! - **Parallel ingestion**: a bounded reader/worker pipeline builds one
//!   deduplicated set per source, all sources loading concurrently
//! - **Two storage backends**: volatile in-memory sets rebuilt on every start,
//!   or a SQLite database populated once and reused across restarts
//! - **Concurrent quorum checks**: every source is queried in parallel for
//!   each validation
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use promo_quorum::backend::open_store;
//! use promo_quorum::config::{StorageKind, ValidatorConfig};
//! use promo_quorum::validator::QuorumValidator;
//!
//! # fn main() -> promo_quorum::Result<()> {
//! let config = ValidatorConfig::new(
//!     StorageKind::Sqlite,
//!     &["promofiles/couponbase1", "promofiles/couponbase2", "promofiles/couponbase3"],
//! );
//! let validator = QuorumValidator::new(Arc::from(open_store(&config)?));
//!
//! if validator.validate_code("ABCD1234")? {
//!     println!("Code accepted");
//! }
//! validator.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **Ingestion**: [`ingest`] streams source files into sets or SQLite tables
//! - **Storage**: [`backend`] holds the [`backend::CodeStore`] contract and its
//!   two implementations
//! - **Validation**: [`validator`] applies the quorum rule
//! - **Configuration**: [`config`] describes backend choice and tuning
//! - **Utilities**: [`utils`] for file helpers and progress reporting
//!
//! ## Error Handling
//!
//! All fallible operations return a [`Result<T>`] type, where errors are
//! represented by [`PromoError`]. Malformed codes are reported as
//! `InvalidCodeFormat`, which [`PromoError::is_user_input`] distinguishes from
//! storage failures.

pub mod backend;
pub mod config;
pub mod error;
pub mod ingest;
pub mod utils;
pub mod validator;

// Re-export commonly used types for convenience
pub use backend::{open_store, CodeStore, MemoryStore, SourceId, SqliteStore};
pub use config::{StorageKind, ValidatorConfig};
pub use validator::QuorumValidator;

// Re-export error types for convenience
pub use error::{PromoError, Result, snafu};
