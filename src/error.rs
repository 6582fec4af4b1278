//! Error types and result type for the promo_quorum crate.
//!
//! This module defines all error variants that can occur while loading code lists,
//! querying a storage backend, or validating a caller-supplied code. It uses the
//! `snafu` library for ergonomic error handling with automatic backtrace capture.
//!
//! # Examples
//!
//! ```
//! use promo_quorum::{PromoError, Result};
//!
//! fn lookup(source_id: u32) -> Result<bool> {
//!     Err(PromoError::invalid_source_id(source_id))
//! }
//!
//! match lookup(7) {
//!     Ok(found) => println!("found: {}", found),
//!     Err(e) if e.is_invalid_source_id() => eprintln!("bad source: {}", e),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```
//!
//! # Error Variants
//!
//! - [`PromoError::Io`]: I/O errors while reading source files or preparing directories
//! - [`PromoError::InvalidSourceId`]: a membership query named a source outside 1..=3
//! - [`PromoError::InvalidCodeFormat`]: a code failed the length check (caller input)
//! - [`PromoError::Database`]: the embedded SQLite store reported an error
//! - [`PromoError::SourceLoad`]: loading one source file failed
//! - [`PromoError::InvalidParameter`]: configuration or setup problems

use std::io;
use std::path::PathBuf;

use snafu::{Backtrace, Snafu};

// Re-export snafu for context providers
pub use snafu;

/// Main error type for the promo_quorum crate.
///
/// All errors include automatic backtrace capture for debugging purposes.
/// Use the helper methods on `PromoError` for convenient error construction.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PromoError {
    /// I/O error not tied to a specific file.
    #[snafu(display("IO error: {source}"))]
    Io {
        source: io::Error,
        backtrace: Backtrace,
    },

    /// I/O error while opening, reading or creating a specific file.
    #[snafu(display("IO error on {}: {source}", path.display()))]
    FileIo {
        path: PathBuf,
        source: io::Error,
        backtrace: Backtrace,
    },

    /// A membership query named a source that does not exist.
    #[snafu(display("Invalid source id: {source_id}"))]
    InvalidSourceId {
        source_id: u32,
        backtrace: Backtrace,
    },

    /// The code is not an acceptable promo code shape.
    #[snafu(display("Invalid promo code: length {length} outside {min}..={max}"))]
    InvalidCodeFormat {
        length: usize,
        min: usize,
        max: usize,
        backtrace: Backtrace,
    },

    /// The embedded database reported an error.
    #[snafu(display("Database error: {source}"))]
    Database {
        source: rusqlite::Error,
        backtrace: Backtrace,
    },

    /// Error parsing the JSON configuration.
    #[snafu(display("Parser error: {source}"))]
    ParserError {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
        backtrace: Backtrace,
    },

    /// Loading one source file failed.
    #[snafu(display("Failed to load source {source_number}: {source}"))]
    SourceLoad {
        source_number: u32,
        #[snafu(source(from(PromoError, Box::new)))]
        source: Box<PromoError>,
    },

    /// Configuration or setup value is not usable.
    #[snafu(display("Invalid parameter: {message}"))]
    InvalidParameter {
        message: String,
        backtrace: Backtrace,
    },

    /// A pipeline worker thread panicked.
    #[snafu(display("Worker panicked: {message}"))]
    WorkerPanicked {
        message: String,
        backtrace: Backtrace,
    },

    /// Operation was interrupted by the progress reporter.
    #[snafu(display("User interrupted"))]
    UserInterrupted {
        backtrace: Backtrace,
    },

    /// The backend was queried after `close`.
    #[snafu(display("Store is closed"))]
    Closed {
        backtrace: Backtrace,
    },
}

// For automatic conversions from standard error types
impl From<io::Error> for PromoError {
    fn from(source: io::Error) -> Self {
        Self::Io { source, backtrace: Backtrace::capture() }
    }
}

impl From<rusqlite::Error> for PromoError {
    fn from(source: rusqlite::Error) -> Self {
        Self::Database { source, backtrace: Backtrace::capture() }
    }
}

impl From<serde_json::Error> for PromoError {
    fn from(source: serde_json::Error) -> Self {
        Self::ParserError {
            source: Box::new(source),
            backtrace: Backtrace::capture(),
        }
    }
}

/// Helper methods for creating errors without context providers.
impl PromoError {
    /// Creates an `InvalidParameter` error with the given message.
    ///
    /// # Examples
    ///
    /// ```
    /// use promo_quorum::PromoError;
    ///
    /// let error = PromoError::invalid_parameter("exactly 3 source paths are required");
    /// ```
    pub fn invalid_parameter<S: Into<String>>(message: S) -> Self {
        Self::InvalidParameter {
            message: message.into(),
            backtrace: Backtrace::capture(),
        }
    }

    /// Creates an `InvalidSourceId` error for the given id.
    pub fn invalid_source_id(source_id: u32) -> Self {
        Self::InvalidSourceId {
            source_id,
            backtrace: Backtrace::capture(),
        }
    }

    /// Creates an `InvalidCodeFormat` error for a code of `length` characters.
    pub fn invalid_code_format(length: usize, min: usize, max: usize) -> Self {
        Self::InvalidCodeFormat {
            length,
            min,
            max,
            backtrace: Backtrace::capture(),
        }
    }

    /// Wraps an I/O error with the file it happened on.
    pub fn file_io<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        Self::FileIo {
            path: path.into(),
            source,
            backtrace: Backtrace::capture(),
        }
    }

    /// Creates a `WorkerPanicked` error.
    pub fn worker_panicked<S: Into<String>>(message: S) -> Self {
        Self::WorkerPanicked {
            message: message.into(),
            backtrace: Backtrace::capture(),
        }
    }

    /// Creates a `UserInterrupted` error.
    pub fn user_interrupted() -> Self {
        Self::UserInterrupted {
            backtrace: Backtrace::capture(),
        }
    }

    /// Creates a `Closed` error.
    pub fn closed() -> Self {
        Self::Closed {
            backtrace: Backtrace::capture(),
        }
    }

    /// Checks if this error is an `InvalidSourceId` variant.
    pub fn is_invalid_source_id(&self) -> bool {
        matches!(self, PromoError::InvalidSourceId { .. })
    }

    /// Checks if this error is an `InvalidCodeFormat` variant.
    pub fn is_invalid_code_format(&self) -> bool {
        matches!(self, PromoError::InvalidCodeFormat { .. })
    }

    /// Returns true when the error was caused by caller input rather than by
    /// storage or setup. Callers map these to a rejected request instead of an
    /// internal failure.
    pub fn is_user_input(&self) -> bool {
        self.is_invalid_code_format()
    }
}

/// A specialized `Result` type for promo_quorum operations.
///
/// This is a convenience type alias that uses [`PromoError`] as the error type.
pub type Result<T> = std::result::Result<T, PromoError>;
