//! Ingestion of newline-delimited code lists
//!
//! This module turns raw source files into the structures the storage
//! backends query: a parallel set builder for the in-memory backend and a
//! batched single-writer loader for the SQLite backend. Both read codes
//! through the same [`LineSource`].

pub mod line_source;
pub mod pipeline;
pub mod sqlite_loader;

pub use line_source::LineSource;
pub use pipeline::{load_all_sources, load_code_set, CodeSet};
pub use sqlite_loader::{load_source_file, LoadStats};
