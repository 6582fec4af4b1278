//! SQLite connection setup and per-source schema.
//!
//! The database holds one table per source with the code as its primary key.
//! Connections are tuned for bulk loading: the data can always be rebuilt
//! from the source files, so durability is relaxed.

use std::path::Path;

use log::*;
use rusqlite::{Connection, OpenFlags, OptionalExtension};

use crate::backend::source_id::{checked_table_name, SourceId};
use crate::{PromoError, Result};

/// Page size for new databases. SQLite ignores it once the file is in WAL
/// mode, so it is set before journaling is switched.
const PAGE_SIZE: i64 = 4096;

/// Connection pragmas, applied in order to every connection.
const PRAGMAS: [(&str, &str); 4] = [
    ("synchronous", "NORMAL"),
    ("cache_size", "10000"),
    ("temp_store", "MEMORY"),
    ("mmap_size", "268435456"),
];

/// Opens (creating if absent) the database at `path` and applies the pragmas.
pub fn open_connection(path: &Path) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(path, flags)?;
    configure_connection(&conn)?;
    Ok(conn)
}

/// Sets the page size, switches the connection to WAL journaling and applies
/// [`PRAGMAS`].
pub fn configure_connection(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "page_size", PAGE_SIZE)?;
    let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        warn!("SQLite refused WAL journaling, running with journal_mode={}", mode);
    }
    for (name, value) in PRAGMAS {
        conn.execute_batch(&format!("PRAGMA {} = {}", name, value))?;
    }
    Ok(())
}

/// Creates the table for every source if it is missing, then confirms each
/// one is listed in the schema catalog.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    debug!("Creating tables for {} promo sources", SourceId::ALL.len());
    for source in SourceId::ALL {
        let table = checked_table_name(source)?;
        conn.execute_batch(&format!("CREATE TABLE IF NOT EXISTS {} (code TEXT PRIMARY KEY)", table))?;

        let listed: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .optional()?;
        if listed.as_deref() != Some(table) {
            return Err(PromoError::invalid_parameter(format!("Table {} was not created", table)));
        }
        debug!("Verified table {} exists in database", table);
    }
    Ok(())
}

/// Number of rows stored for `source`. A missing table counts as empty.
pub fn row_count(conn: &Connection, source: SourceId) -> Result<u64> {
    let table = checked_table_name(source)?;
    match conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get::<_, i64>(0)) {
        Ok(count) => Ok(count as u64),
        Err(e) if is_missing_table(&e) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Whether `source` already holds at least one code.
pub fn has_rows(conn: &Connection, source: SourceId) -> Result<bool> {
    let table = checked_table_name(source)?;
    match conn.query_row(&format!("SELECT EXISTS (SELECT 1 FROM {} LIMIT 1)", table), [], |row| {
        row.get::<_, bool>(0)
    }) {
        Ok(populated) => Ok(populated),
        Err(e) if is_missing_table(&e) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Builds the lookup index for every source table.
pub fn create_indexes(conn: &Connection) -> Result<()> {
    for source in SourceId::ALL {
        let table = checked_table_name(source)?;
        conn.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS {} ON {}(code)",
            source.index_name(),
            table
        ))?;
    }
    Ok(())
}

/// True for the error SQLite reports when a table does not exist.
pub fn is_missing_table(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => message.contains("no such table"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_connection(&dir.path().join("promo.db")).unwrap();
        (dir, conn)
    }

    #[test]
    fn test_schema_is_idempotent() {
        let (_dir, conn) = temp_db();
        initialize_schema(&conn).unwrap();
        initialize_schema(&conn).unwrap();
        for source in SourceId::ALL {
            assert_eq!(row_count(&conn, source).unwrap(), 0);
            assert!(!has_rows(&conn, source).unwrap());
        }
    }

    #[test]
    fn test_wal_mode_applied() {
        let (_dir, conn) = temp_db();
        let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0)).unwrap();
        assert_eq!(mode.to_ascii_lowercase(), "wal");
    }

    #[test]
    fn test_page_size_survives_wal_switch() {
        let (_dir, conn) = temp_db();
        initialize_schema(&conn).unwrap();
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0)).unwrap();
        assert_eq!(page_size, PAGE_SIZE);
    }

    #[test]
    fn test_missing_table_counts_as_empty() {
        let (_dir, conn) = temp_db();
        assert_eq!(row_count(&conn, SourceId::Two).unwrap(), 0);
        assert!(!has_rows(&conn, SourceId::Three).unwrap());

        let err = conn.prepare("SELECT 1 FROM source_1").unwrap_err();
        assert!(is_missing_table(&err));
    }

    #[test]
    fn test_indexes_created() {
        let (_dir, conn) = temp_db();
        initialize_schema(&conn).unwrap();
        create_indexes(&conn).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_source_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }
}
