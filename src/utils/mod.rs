// Utility functions and helpers
//
// This module provides file helpers shared by both loaders and the progress
// reporting used during long loads.

pub mod io_utils;
pub mod progress_report;

pub use io_utils::{ensure_parent_dir, ensure_source_file, open_buffered};
pub use progress_report::{ProgressReportFn, ProgressState};
