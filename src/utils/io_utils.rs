//! I/O utility functions for source files and database paths.
//!
//! This module provides helper functions for:
//! - Opening a source file behind a large buffered reader
//! - Creating the parent directory of a file path
//! - Bootstrapping a missing source file with placeholder codes
//!
//! # Examples
//!
//! ```no_run
//! use promo_quorum::utils::io_utils::open_buffered;
//!
//! let (reader, size) = open_buffered("promofiles/couponbase1", 1024 * 1024).unwrap();
//! println!("{} bytes to read", size);
//! ```

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;

use log::*;

use crate::{PromoError, Result};

/// Contents written to a source file that does not exist yet.
pub const PLACEHOLDER_CODES: &str = "testcode1\ntestcode2\ntestcode3\n";

/// Opens `path` for reading behind a `BufReader` of `capacity` bytes.
///
/// # Returns
///
/// The reader and the file size in bytes (used for progress reporting).
pub fn open_buffered<P: AsRef<Path>>(path: P, capacity: usize) -> Result<(BufReader<File>, u64)> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| PromoError::file_io(path, e))?;
    let size = file.metadata().map_err(|e| PromoError::file_io(path, e))?.len();
    Ok((BufReader::with_capacity(capacity, file), size))
}

/// Creates the directory that will contain `path`, if it has one.
pub fn ensure_parent_dir<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|e| PromoError::file_io(dir, e))
        }
        _ => Ok(()),
    }
}

/// Makes sure a source file exists, writing [`PLACEHOLDER_CODES`] when it does not.
///
/// This lets a fresh environment start without real code lists.
///
/// # Returns
///
/// Returns `true` if the placeholder was created.
pub fn ensure_source_file<P: AsRef<Path>>(path: P) -> Result<bool> {
    let path = path.as_ref();
    match fs::metadata(path) {
        Ok(_) => Ok(false),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("Source file {} doesn't exist, creating placeholder", path.display());
            ensure_parent_dir(path)?;
            fs::write(path, PLACEHOLDER_CODES).map_err(|e| PromoError::file_io(path, e))?;
            Ok(true)
        }
        Err(e) => Err(PromoError::file_io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_source_file_creates_placeholder_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/couponbase2");

        assert!(ensure_source_file(&path).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), PLACEHOLDER_CODES);

        fs::write(&path, "REALCODE1\n").unwrap();
        assert!(!ensure_source_file(&path).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "REALCODE1\n");
    }

    #[test]
    fn test_open_buffered_reports_size_and_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes");
        fs::write(&path, "ABCDEFGH\n").unwrap();
        let (_, size) = open_buffered(&path, 64).unwrap();
        assert_eq!(size, 9);

        let err = open_buffered(dir.path().join("absent"), 64).unwrap_err();
        assert!(matches!(err, PromoError::FileIo { .. }), "{}", err);
    }
}
