//! Progress reporting for long-running loads.
//!
//! Both ingestion paths (the in-memory pipeline and the SQLite batch loader)
//! report how many bytes of a source file they have consumed. Callers receive
//! periodic updates and may cancel the load.
//!
//! # Examples
//!
//! ```
//! use promo_quorum::utils::{ProgressState, ProgressReportFn};
//!
//! fn my_reporter(state: &mut ProgressState) -> bool {
//!     println!("{}: {}/{}", state.state_id, state.current, state.total);
//!     false // Return true to cancel the load
//! }
//!
//! let mut progress = ProgressState::new("source 1", 1000, 10, Some(my_reporter as ProgressReportFn));
//! for pos in (0..1000).step_by(50) {
//!     if progress.report(pos) {
//!         break;
//!     }
//! }
//! ```

/// Function type for progress reporting callbacks.
///
/// The function receives a mutable reference to the progress state and
/// returns `true` to cancel the load, or `false` to continue.
pub type ProgressReportFn = fn(&mut ProgressState) -> bool;

/// State information for progress reporting.
pub struct ProgressState {
    /// Identifier for this progress state (e.g. "source 2")
    pub state_id: String,
    /// Total amount of work, in bytes of the source file
    pub total: u64,
    /// Position at the most recent report
    pub current: u64,
    /// Position at which progress was last reported
    pub last: u64,
    /// Distance between reports
    pub report_interval: u64,
    /// Optional reporter function to call
    pub reporter: Option<ProgressReportFn>,
}

impl ProgressState {
    /// Creates a new progress state.
    ///
    /// # Arguments
    ///
    /// * `state_id` - Identifier for this progress state
    /// * `total` - Total amount of work
    /// * `report_interval_percent` - Percentage of `total` between reports (0-100)
    /// * `reporter` - Optional reporter function
    pub fn new(state_id: &str, total: u64, report_interval_percent: u64, reporter: Option<ProgressReportFn>) -> Self {
        Self {
            state_id: state_id.to_string(),
            total,
            current: 0,
            last: 0,
            report_interval: total.saturating_mul(report_interval_percent) / 100,
            reporter,
        }
    }

    /// Reports progress at position `current`.
    ///
    /// The reporter is only invoked once `report_interval` has elapsed since
    /// the previous report, or when the end is reached.
    ///
    /// # Returns
    ///
    /// Returns `true` if the load should be cancelled, `false` otherwise.
    pub fn report(&mut self, current: u64) -> bool {
        let Some(reporter) = self.reporter else {
            return false;
        };
        if current.saturating_sub(self.last) > self.report_interval || current >= self.total {
            self.current = current;
            let cancelled = reporter(self);
            self.last = current;
            return cancelled;
        }
        false
    }
}
