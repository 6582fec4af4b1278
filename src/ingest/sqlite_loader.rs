//! Single-writer bulk loader for the SQLite backend.
//!
//! Codes are streamed from the source file and inserted with
//! `INSERT OR IGNORE`, committing every `batch_size` codes. A crash mid-load
//! keeps everything up to the last committed batch.

use std::path::Path;
use std::time::Instant;

use log::*;
use rusqlite::{Connection, TransactionBehavior};

use crate::backend::source_id::{checked_table_name, SourceId};
use crate::config::READER_BUFFER_SIZE;
use crate::ingest::line_source::LineSource;
use crate::utils::io_utils::{ensure_source_file, open_buffered};
use crate::utils::progress_report::{ProgressReportFn, ProgressState};
use crate::{PromoError, Result};

const BATCHES_PER_LOG: u64 = 10;

/// Counters from one source load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Non-empty codes read from the file
    pub codes_read: u64,
    /// Rows actually added (duplicates are ignored)
    pub rows_inserted: u64,
    /// Committed transactions
    pub batches: u64,
    /// Lines dropped because they were not valid UTF-8
    pub lines_skipped: u64,
}

/// Loads the code list at `path` into the table for `source`.
///
/// A missing file is replaced by a small placeholder list first, so a fresh
/// environment can start.
///
/// # Errors
///
/// Fails on I/O errors, on any failed insert or commit, or when the progress
/// reporter cancels. Batches committed before the failure stay in the table.
pub fn load_source_file(
    conn: &mut Connection,
    source: SourceId,
    path: &Path,
    batch_size: usize,
    prog_rpt: Option<ProgressReportFn>,
) -> Result<LoadStats> {
    let start = Instant::now();
    info!("Starting to load {}: {}", source, path.display());

    ensure_source_file(path)?;
    let (reader, file_size) = open_buffered(path, READER_BUFFER_SIZE)?;
    let mut codes = LineSource::new(reader);
    let mut progress = ProgressState::new(&source.to_string(), file_size, 10, prog_rpt);

    let table = checked_table_name(source)?;
    let sql = format!("INSERT OR IGNORE INTO {} (code) VALUES (?1)", table);
    let batch_size = batch_size.max(1);
    let mut stats = LoadStats::default();

    loop {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut in_batch = 0usize;
        let mut finished = false;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            while in_batch < batch_size {
                let Some(code) = codes.next_code()? else {
                    finished = true;
                    break;
                };
                stats.rows_inserted += stmt.execute([code.as_str()])? as u64;
                stats.codes_read += 1;
                in_batch += 1;
            }
        }
        tx.commit()?;
        if in_batch > 0 {
            stats.batches += 1;
            if stats.batches % BATCHES_PER_LOG == 0 {
                info!("{}: Inserted {} codes...", source, stats.codes_read);
            }
        }
        if progress.report(codes.bytes_read()) {
            info!("Loading {} cancelled by user", source);
            return Err(PromoError::user_interrupted());
        }
        if finished {
            break;
        }
    }

    stats.lines_skipped = codes.skipped_lines();
    if stats.lines_skipped > 0 {
        warn!("{}: skipped {} lines that are not valid UTF-8", source, stats.lines_skipped);
    }
    info!(
        "Completed loading {} with {} codes ({} new rows) in {:?}",
        source,
        stats.codes_read,
        stats.rows_inserted,
        start.elapsed()
    );
    Ok(stats)
}
