//! Persistent backend on an embedded SQLite database.
//!
//! On open the store makes sure one table per source exists, checks which
//! sources already hold data, and bulk-loads only the empty ones. A database
//! whose tables are all populated is reused as-is, so restarts skip the load
//! entirely. After loading, lookups go through a small pool of connections so
//! concurrent callers do not queue behind a single handle.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::Instant;

use log::*;
use rusqlite::Connection;

use crate::backend::schema::{
    create_indexes, has_rows, initialize_schema, is_missing_table, open_connection, row_count,
};
use crate::backend::source_id::{checked_table_name, SourceId, SOURCE_COUNT};
use crate::backend::CodeStore;
use crate::config::SqliteConfig;
use crate::ingest::sqlite_loader::load_source_file;
use crate::utils::io_utils::ensure_parent_dir;
use crate::{PromoError, Result};

type PooledConnection = Mutex<Option<Connection>>;

/// Durable backend: one `source_N` table per source.
pub struct SqliteStore {
    pool: Vec<PooledConnection>,
    next: AtomicUsize,
    lookup_sql: [String; SOURCE_COUNT],
    loaded: Vec<SourceId>,
}

impl SqliteStore {
    /// Opens the database named in `config`, loading any source whose table is
    /// still empty from the matching entry of `paths`.
    ///
    /// A source counts as loaded once its table holds at least one row. A load
    /// that is cancelled or fails partway keeps its committed batches, so the
    /// next `open` treats that table as populated and does not resume it. The
    /// source stays partial until the database file is deleted.
    ///
    /// # Errors
    ///
    /// Setup failures (directory creation, schema creation or verification)
    /// and load failures are returned; no store is produced in that case.
    /// Load failures are wrapped in `SourceLoad` with the source number.
    pub fn open<P: AsRef<Path>>(paths: &[P], config: &SqliteConfig) -> Result<Self> {
        if paths.len() != SOURCE_COUNT {
            return Err(PromoError::invalid_parameter(format!(
                "Expected {} source paths, got {}",
                SOURCE_COUNT,
                paths.len()
            )));
        }
        let start = Instant::now();
        let db_path = config.database_path.as_path();
        ensure_parent_dir(db_path)?;

        let mut writer = open_connection(db_path)?;
        initialize_schema(&writer)?;

        let mut pending = Vec::new();
        for source in SourceId::ALL {
            if !has_rows(&writer, source)? {
                pending.push(source);
            }
        }

        if pending.is_empty() {
            info!("Promo code tables in {} already populated, skipping load", db_path.display());
        } else {
            info!("Promo code tables {:?} are empty, loading data...", pending);
            let batch_size = config.effective_batch_size();
            for &source in &pending {
                load_source_file(&mut writer, source, paths[source.slot()].as_ref(), batch_size, config.progress)
                    .map_err(|e| PromoError::SourceLoad { source_number: source.number(), source: Box::new(e) })?;
            }
        }

        if config.create_indexes {
            debug!("Creating indexes on promo code tables...");
            create_indexes(&writer)?;
        }

        let pool_size = config.effective_worker_count().max(1);
        let mut pool = Vec::with_capacity(pool_size);
        pool.push(Mutex::new(Some(writer)));
        for _ in 1..pool_size {
            pool.push(Mutex::new(Some(open_connection(db_path)?)));
        }

        let lookup_sql = SourceId::ALL.map(|source| {
            format!("SELECT 1 FROM {} WHERE code = ?1 LIMIT 1", source.table_name())
        });

        info!(
            "SQLite promo store ready at {} with {} connections in {:?}",
            db_path.display(),
            pool_size,
            start.elapsed()
        );
        Ok(SqliteStore {
            pool,
            next: AtomicUsize::new(0),
            lookup_sql,
            loaded: pending,
        })
    }

    /// Sources that were loaded from their files by this `open`. Empty when
    /// the database was already populated.
    pub fn loaded_sources(&self) -> &[SourceId] {
        &self.loaded
    }

    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Number of codes stored for `source`.
    pub fn row_count(&self, source: SourceId) -> Result<u64> {
        let guard = self.acquire();
        let conn = guard.as_ref().ok_or_else(PromoError::closed)?;
        row_count(conn, source)
    }

    /// True when every source table holds at least one code.
    pub fn is_populated(&self) -> Result<bool> {
        let guard = self.acquire();
        let conn = guard.as_ref().ok_or_else(PromoError::closed)?;
        for source in SourceId::ALL {
            if !has_rows(conn, source)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Picks a free pooled connection, starting from a rotating position, and
    /// waits on that position if every connection is busy.
    fn acquire(&self) -> MutexGuard<'_, Option<Connection>> {
        let len = self.pool.len();
        let first = self.next.fetch_add(1, Ordering::Relaxed) % len;
        for offset in 0..len {
            match self.pool[(first + offset) % len].try_lock() {
                Ok(guard) => return guard,
                Err(TryLockError::Poisoned(poisoned)) => return poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => continue,
            }
        }
        self.pool[first].lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CodeStore for SqliteStore {
    fn exists(&self, code: &str, source_id: u32) -> Result<bool> {
        let source = SourceId::try_from(source_id)?;
        checked_table_name(source)?;
        let guard = self.acquire();
        let conn = guard.as_ref().ok_or_else(PromoError::closed)?;
        let mut stmt = match conn.prepare_cached(&self.lookup_sql[source.slot()]) {
            Ok(stmt) => stmt,
            Err(e) if is_missing_table(&e) => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        match stmt.exists([code]) {
            Ok(found) => Ok(found),
            Err(e) if is_missing_table(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn close(&self) -> Result<()> {
        let mut first_err = None;
        for slot in &self.pool {
            let mut guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(conn) = guard.take() {
                if let Err((_, e)) = conn.close() {
                    warn!("Failed to close SQLite connection: {}", e);
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::thread;

    struct Fixture {
        dir: tempfile::TempDir,
        paths: Vec<PathBuf>,
        config: SqliteConfig,
    }

    fn fixture(bodies: [&str; 3]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let paths = bodies
            .iter()
            .enumerate()
            .map(|(i, body)| {
                let p = dir.path().join(format!("promofiles/couponbase{}", i + 1));
                fs::create_dir_all(p.parent().unwrap()).unwrap();
                fs::write(&p, body).unwrap();
                p
            })
            .collect();
        let config = SqliteConfig {
            database_path: dir.path().join("db/promo_codes.db"),
            batch_size: 2,
            worker_count: 3,
            ..Default::default()
        };
        Fixture { dir, paths, config }
    }

    fn cancel_immediately(_state: &mut crate::utils::progress_report::ProgressState) -> bool {
        true
    }

    fn scenario() -> Fixture {
        fixture(["ABCD1234\n", "ABCD1234\nXYZZY999\n", "QQQQ7777\n"])
    }

    #[test]
    fn test_first_open_loads_every_source() {
        let fx = scenario();
        let store = SqliteStore::open(&fx.paths, &fx.config).unwrap();

        assert_eq!(store.loaded_sources(), &SourceId::ALL);
        assert!(store.is_populated().unwrap());
        assert_eq!(store.pool_size(), 3);
        assert!(store.exists("ABCD1234", 1).unwrap());
        assert!(store.exists("XYZZY999", 2).unwrap());
        assert!(!store.exists("XYZZY999", 3).unwrap());
        assert_eq!(store.row_count(SourceId::Two).unwrap(), 2);
    }

    #[test]
    fn test_reopen_skips_reload_and_answers_the_same() {
        let fx = scenario();
        let lookups = [("ABCD1234", 1), ("ABCD1234", 2), ("XYZZY999", 2), ("QQQQ7777", 3), ("NEWCODE1", 1)];

        let first: Vec<bool> = {
            let store = SqliteStore::open(&fx.paths, &fx.config).unwrap();
            let answers = lookups.iter().map(|(c, s)| store.exists(c, *s).unwrap()).collect();
            store.close().unwrap();
            answers
        };

        // Changing the files must not matter once the database is populated.
        fs::write(&fx.paths[0], "NEWCODE1\n").unwrap();

        let store = SqliteStore::open(&fx.paths, &fx.config).unwrap();
        assert!(store.loaded_sources().is_empty());
        let second: Vec<bool> = lookups.iter().map(|(c, s)| store.exists(c, *s).unwrap()).collect();
        assert_eq!(first, second);
        assert!(!second[4]);
    }

    #[test]
    fn test_empty_source_one_is_reloaded() {
        let fx = scenario();
        {
            let store = SqliteStore::open(&fx.paths, &fx.config).unwrap();
            store.close().unwrap();
        }
        let conn = Connection::open(&fx.config.database_path).unwrap();
        conn.execute("DELETE FROM source_1", []).unwrap();
        drop(conn);

        let store = SqliteStore::open(&fx.paths, &fx.config).unwrap();
        assert_eq!(store.loaded_sources(), &[SourceId::One]);
        assert!(store.exists("ABCD1234", 1).unwrap());
    }

    #[test]
    fn test_missing_source_file_is_bootstrapped() {
        let fx = scenario();
        fs::remove_file(&fx.paths[2]).unwrap();

        let store = SqliteStore::open(&fx.paths, &fx.config).unwrap();
        assert!(fx.paths[2].exists());
        assert!(store.exists("testcode2", 3).unwrap());
        assert!(fx.dir.path().join("db/promo_codes.db").exists());
    }

    #[test]
    fn test_failed_load_reports_source() {
        let fx = scenario();
        fs::remove_file(&fx.paths[1]).unwrap();
        fs::create_dir(&fx.paths[1]).unwrap();

        let err = SqliteStore::open(&fx.paths, &fx.config).err().unwrap();
        assert!(matches!(err, PromoError::SourceLoad { source_number: 2, .. }), "{}", err);
    }

    #[test]
    fn test_partial_load_is_not_resumed() {
        let mut fx = fixture(["AAAAAAAA\nBBBBBBBB\nCCCCCCCC\n", "ABCD1234\n", "QQQQ7777\n"]);
        fx.config.batch_size = 1;
        fx.config.progress = Some(cancel_immediately);
        let err = SqliteStore::open(&fx.paths, &fx.config).err().unwrap();
        assert!(matches!(err, PromoError::SourceLoad { source_number: 1, .. }), "{}", err);

        fx.config.progress = None;
        let store = SqliteStore::open(&fx.paths, &fx.config).unwrap();
        assert_eq!(store.loaded_sources(), &[SourceId::Two, SourceId::Three]);
        assert_eq!(store.row_count(SourceId::One).unwrap(), 1);
        assert!(store.exists("AAAAAAAA", 1).unwrap());
        assert!(!store.exists("CCCCCCCC", 1).unwrap());
    }

    #[test]
    fn test_invalid_source_id() {
        let fx = scenario();
        let store = SqliteStore::open(&fx.paths, &fx.config).unwrap();
        for bad in [0, 4] {
            assert!(store.exists("ABCD1234", bad).unwrap_err().is_invalid_source_id());
        }
    }

    #[test]
    fn test_missing_table_is_not_found() {
        let fx = scenario();
        let store = SqliteStore::open(&fx.paths, &fx.config).unwrap();
        let conn = Connection::open(&fx.config.database_path).unwrap();
        conn.execute_batch("DROP TABLE source_3").unwrap();
        drop(conn);

        // Pooled connections may have the lookup cached; any of them must cope.
        for _ in 0..store.pool_size() * 2 {
            assert!(!store.exists("QQQQ7777", 3).unwrap());
        }
        assert!(!store.is_populated().unwrap());
    }

    #[test]
    fn test_close_is_idempotent() {
        let fx = scenario();
        let store = SqliteStore::open(&fx.paths, &fx.config).unwrap();
        store.close().unwrap();
        store.close().unwrap();
        let err = store.exists("ABCD1234", 1).unwrap_err();
        assert!(matches!(err, PromoError::Closed { .. }), "{}", err);
    }

    #[test]
    fn test_indexes_are_optional() {
        let mut fx = scenario();
        fx.config.create_indexes = true;
        let store = SqliteStore::open(&fx.paths, &fx.config).unwrap();
        store.close().unwrap();

        let conn = Connection::open(&fx.config.database_path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_source_%'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_concurrent_lookups() {
        let body: String = (0..500).map(|i| format!("CODE{:05}\n", i)).collect();
        let fx = fixture([body.as_str(), body.as_str(), "\n"]);
        let store = Arc::new(SqliteStore::open(&fx.paths, &fx.config).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in (t..500).step_by(8) {
                        let code = format!("CODE{:05}", i);
                        assert!(store.exists(&code, 1).unwrap());
                        assert!(store.exists(&code, 2).unwrap());
                        assert!(!store.exists(&code, 3).unwrap());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
