//! Parallel loader that turns one code list into a membership set.
//!
//! One reader thread streams the file into a bounded queue. A pool of workers
//! drains the queue into private sets with no locking, and once the queue is
//! closed each worker takes the shared set's lock exactly once to merge its
//! local set. The bounded queue keeps the reader from running far ahead of
//! the workers.
//!
//! All threads are scoped: none of them outlives [`load_code_set`].

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded};
use log::*;

use crate::backend::source_id::SourceId;
use crate::config::PipelineOptions;
use crate::ingest::line_source::LineSource;
use crate::utils::io_utils::open_buffered;
use crate::utils::progress_report::ProgressState;
use crate::{PromoError, Result};

/// A deduplicated set of codes from one source.
pub type CodeSet = HashSet<String>;

const PROGRESS_LOG_LINES: u64 = 1_000_000;
const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Loads the code list at `path` into a set.
///
/// # Errors
///
/// Fails if the file cannot be opened, a read fails mid-stream, the progress
/// reporter cancels the load, or a worker panics. Otherwise returns a set
/// (empty for a file with no codes).
pub fn load_code_set<P: AsRef<Path>>(path: P, options: &PipelineOptions) -> Result<CodeSet> {
    let path = path.as_ref();
    let start = Instant::now();
    let (reader, file_size) = open_buffered(path, options.reader_buffer_size)?;
    let worker_count = options.worker_count();
    debug!("Loading {} with {} workers", path.display(), worker_count);

    let global = Mutex::new(CodeSet::with_capacity(options.initial_capacity));
    let (tx, rx) = bounded::<String>(options.queue_capacity.max(1));

    let reader_result = thread::scope(|s| {
        let reader_task = s.spawn(move || {
            let mut progress = ProgressState::new(&path.display().to_string(), file_size, 10, options.progress);
            read_codes(LineSource::new(reader), tx, path, &mut progress)
        });

        let workers: Vec<_> = (0..worker_count)
            .map(|_| {
                let rx = rx.clone();
                let global = &global;
                s.spawn(move || drain_and_merge(rx, global))
            })
            .collect();
        drop(rx);

        let mut panicked = false;
        for worker in workers {
            panicked |= worker.join().is_err();
        }
        let read = reader_task
            .join()
            .unwrap_or_else(|_| Err(PromoError::worker_panicked("reader thread panicked")));
        if panicked {
            return Err(PromoError::worker_panicked("pipeline worker panicked"));
        }
        read
    });

    let lines = reader_result?;
    let codes = global
        .into_inner()
        .map_err(|_| PromoError::worker_panicked("code set lock poisoned"))?;
    info!(
        "Completed reading {} ({} lines) with {} unique codes in {:?}",
        path.display(),
        lines,
        codes.len(),
        start.elapsed()
    );
    Ok(codes)
}

/// Loads every source concurrently, one pipeline per source.
///
/// The first failure (in source order) is returned once all loads have
/// finished; sibling loads are not cancelled.
pub fn load_all_sources<P: AsRef<Path> + Sync>(paths: &[P], options: &PipelineOptions) -> Result<Vec<CodeSet>> {
    if paths.len() != SourceId::ALL.len() {
        return Err(PromoError::invalid_parameter(format!(
            "Expected {} source paths, got {}",
            SourceId::ALL.len(),
            paths.len()
        )));
    }
    let start = Instant::now();
    info!("Starting parallel loading of {} promo code files...", paths.len());

    let results: Vec<Result<CodeSet>> = thread::scope(|s| {
        let tasks: Vec<_> = SourceId::ALL
            .into_iter()
            .zip(paths)
            .map(|(source, path)| {
                s.spawn(move || {
                    let path = path.as_ref();
                    info!("Starting to load {}: {}", source, path.display());
                    load_code_set(path, options).map_err(|e| {
                        warn!("Error loading {}: {}", source, e);
                        PromoError::SourceLoad { source_number: source.number(), source: Box::new(e) }
                    })
                })
            })
            .collect();
        tasks
            .into_iter()
            .map(|task| {
                task.join()
                    .unwrap_or_else(|_| Err(PromoError::worker_panicked("source loader panicked")))
            })
            .collect()
    });

    let sets = results.into_iter().collect::<Result<Vec<_>>>()?;
    info!("Successfully loaded all promo files in {:?}", start.elapsed());
    Ok(sets)
}

fn read_codes<R: std::io::BufRead>(
    mut source: LineSource<R>,
    tx: Sender<String>,
    path: &Path,
    progress: &mut ProgressState,
) -> Result<u64> {
    let mut last_log = Instant::now();
    while let Some(code) = source.next_code()? {
        if tx.send(code).is_err() {
            // Every worker is gone; the join in the caller reports why.
            break;
        }
        let line_no = source.line_no();
        if line_no % PROGRESS_LOG_LINES == 0 && last_log.elapsed() >= PROGRESS_LOG_INTERVAL {
            info!("File {}: Read {} million lines...", path.display(), line_no / PROGRESS_LOG_LINES);
            last_log = Instant::now();
        }
        if progress.report(source.bytes_read()) {
            info!("Loading {} cancelled by user", path.display());
            return Err(PromoError::user_interrupted());
        }
    }
    if source.skipped_lines() > 0 {
        warn!("File {}: skipped {} lines that are not valid UTF-8", path.display(), source.skipped_lines());
    }
    Ok(source.line_no())
}

fn drain_and_merge(rx: Receiver<String>, global: &Mutex<CodeSet>) {
    let mut local = CodeSet::new();
    for code in rx.iter() {
        local.insert(code);
    }
    if local.is_empty() {
        return;
    }
    // A poisoned lock means another worker panicked mid-merge; the caller
    // observes that panic through its join handle.
    if let Ok(mut set) = global.lock() {
        set.extend(local);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    fn small_options() -> PipelineOptions {
        PipelineOptions {
            queue_capacity: 4,
            initial_capacity: 16,
            ..Default::default()
        }
    }

    fn cancel_immediately(_state: &mut ProgressState) -> bool {
        true
    }

    #[test]
    fn test_collapses_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("couponbase1");
        fs::write(&path, "ABCD1234\nABCD1234\n\n  XYZZY999 \nABCD1234\n").unwrap();

        let set = load_code_set(&path, &small_options()).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("ABCD1234"));
        assert!(set.contains("XYZZY999"));
    }

    #[test]
    fn test_doubled_file_yields_same_set() {
        let dir = tempfile::tempdir().unwrap();
        let once = dir.path().join("once");
        let twice = dir.path().join("twice");
        let body: String = (0..5_000).map(|i| format!("CODE{:05}\n", i)).collect();
        fs::write(&once, &body).unwrap();
        fs::write(&twice, format!("{}{}", body, body)).unwrap();

        let a = load_code_set(&once, &small_options()).unwrap();
        let b = load_code_set(&twice, &small_options()).unwrap();
        assert_eq!(a.len(), 5_000);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_file_gives_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        fs::write(&path, "\n\n   \n").unwrap();
        assert!(load_code_set(&path, &small_options()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_code_set(dir.path().join("nope"), &small_options()).unwrap_err();
        assert!(matches!(err, PromoError::FileIo { .. }), "{}", err);
    }

    #[test]
    fn test_progress_reporter_can_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes");
        fs::write(&path, "AAAAAAAA\nBBBBBBBB\n").unwrap();
        let options = PipelineOptions { progress: Some(cancel_immediately), ..small_options() };
        let err = load_code_set(&path, &options).unwrap_err();
        assert!(matches!(err, PromoError::UserInterrupted { .. }), "{}", err);
    }

    #[test]
    fn test_load_all_fails_on_first_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let p1 = dir.path().join("couponbase1");
        let p3 = dir.path().join("couponbase3");
        fs::write(&p1, "ABCD1234\n").unwrap();
        fs::write(&p3, "QQQQ7777\n").unwrap();
        let paths = [p1, dir.path().join("couponbase2"), p3];

        let err = load_all_sources(&paths, &small_options()).unwrap_err();
        assert!(matches!(err, PromoError::SourceLoad { source_number: 2, .. }), "{}", err);
    }

    #[test]
    fn test_load_all_keeps_source_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = (1..=3)
            .map(|n| {
                let p = dir.path().join(format!("couponbase{}", n));
                fs::write(&p, format!("ONLYIN{:02}\n", n)).unwrap();
                p
            })
            .collect();

        let sets = load_all_sources(&paths, &small_options()).unwrap();
        assert_eq!(sets.len(), 3);
        for (i, set) in sets.iter().enumerate() {
            assert!(set.contains(&format!("ONLYIN{:02}", i + 1)));
            assert_eq!(set.len(), 1);
        }
    }
}
