//! Majority-quorum validation of promo codes.
//!
//! A code is honored when at least [`QUORUM`] of the [`SOURCE_COUNT`]
//! independent lists contain it. One list may be stale or deliberately omit a
//! code without affecting the outcome, while a code that collides with a
//! single list is still rejected.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use promo_quorum::backend::open_store;
//! use promo_quorum::config::ValidatorConfig;
//! use promo_quorum::validator::QuorumValidator;
//!
//! # fn main() -> promo_quorum::Result<()> {
//! let store = open_store(&ValidatorConfig::default())?;
//! let validator = QuorumValidator::new(Arc::from(store));
//! match validator.validate_code("ABCD1234") {
//!     Ok(true) => println!("accepted"),
//!     Ok(false) => println!("rejected"),
//!     Err(e) if e.is_user_input() => println!("malformed code: {}", e),
//!     Err(e) => eprintln!("storage failure: {}", e),
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::thread;

use log::*;

use crate::backend::source_id::{SourceId, SOURCE_COUNT};
use crate::backend::CodeStore;
use crate::{PromoError, Result};

/// Shortest acceptable code, in characters.
pub const MIN_CODE_LEN: usize = 8;

/// Longest acceptable code, in characters.
pub const MAX_CODE_LEN: usize = 10;

/// Sources that must contain a code for it to be valid.
pub const QUORUM: usize = 2;

/// Checks the shape of a non-empty code without touching storage.
pub fn check_code_format(code: &str) -> Result<()> {
    let length = code.chars().count();
    if !(MIN_CODE_LEN..=MAX_CODE_LEN).contains(&length) {
        return Err(PromoError::invalid_code_format(length, MIN_CODE_LEN, MAX_CODE_LEN));
    }
    Ok(())
}

/// Answers "is this code valid?" against a [`CodeStore`].
///
/// The validator holds no locks of its own; concurrent calls only contend
/// inside the store's lookups.
#[derive(Clone)]
pub struct QuorumValidator {
    store: Arc<dyn CodeStore>,
}

impl QuorumValidator {
    pub fn new(store: Arc<dyn CodeStore>) -> Self {
        QuorumValidator { store }
    }

    pub fn store(&self) -> &Arc<dyn CodeStore> {
        &self.store
    }

    /// Decides whether `code` is a valid promo code.
    ///
    /// - An empty code means "no code supplied" and is valid.
    /// - A code outside [`MIN_CODE_LEN`]..=[`MAX_CODE_LEN`] characters fails
    ///   with `InvalidCodeFormat` and is never looked up.
    /// - Otherwise every source is queried concurrently and the code is valid
    ///   when at least [`QUORUM`] of them contain it.
    ///
    /// # Errors
    ///
    /// Any lookup error is returned as-is; a failing source never counts as
    /// "not found".
    pub fn validate_code(&self, code: &str) -> Result<bool> {
        if code.is_empty() {
            return Ok(true);
        }
        let hits = self.hit_count(code)?;
        debug!("Promo code exists in {} of {} sources", hits, SOURCE_COUNT);
        Ok(hits >= QUORUM)
    }

    /// Number of sources containing `code`, queried concurrently.
    pub fn hit_count(&self, code: &str) -> Result<usize> {
        check_code_format(code)?;

        let results: Vec<Result<bool>> = thread::scope(|s| {
            let lookups: Vec<_> = SourceId::ALL
                .into_iter()
                .map(|source| s.spawn(move || self.store.exists(code, source.number())))
                .collect();
            lookups
                .into_iter()
                .map(|lookup| {
                    lookup
                        .join()
                        .unwrap_or_else(|_| Err(PromoError::worker_panicked("source lookup panicked")))
                })
                .collect()
        });

        let mut hits = 0;
        for found in results {
            if found? {
                hits += 1;
            }
        }
        Ok(hits)
    }

    /// Closes the underlying store.
    pub fn close(&self) -> Result<()> {
        self.store.close()
    }
}
