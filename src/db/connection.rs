use crate::db::migration_runner::MigrationRunner;
use rusqlite::{Connection, Result};
use std::sync::Mutex;

pub struct Database {
    pub conn: Mutex<Connection>,
}

impl Database {
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        // Enable foreign keys
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        // Enable WAL mode for better concurrency
        if db_path != ":memory:" {
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }

        let runner = MigrationRunner::new();

        log::info!("=== Starting database migration check ===");

        let current_version = runner.get_current_version(&conn)?;
        log::info!("Current schema version: {:?}", current_version);

        let applied = runner.run_pending_migrations(&conn, db_path)?;

        if applied > 0 {
            log::info!("Applied {} migrations successfully", applied);
        } else {
            log::info!("Database schema is up to date");
        }

        // Verify migration integrity (checksums)
        runner.verify_migrations(&conn)?;

        if let Some(version) = runner.get_current_version(&conn)? {
            log::info!("Final schema version: {}", version);
        }

        log::info!("=== Migration check complete ===");

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    /// Fresh in-memory database with the full schema applied. Test helper and
    /// ephemeral-mode constructor.
    pub fn open_in_memory() -> Result<Self> {
        Self::new(":memory:")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_database_has_schema() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn.lock().unwrap();
        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='trades'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn file_database_applies_migrations_and_backs_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.db");
        let path_str = path.to_str().unwrap();

        {
            let _db = Database::new(path_str).unwrap();
        }
        assert!(path.exists());
        // Pre-migration backups land next to the database file.
        assert!(dir.path().join("backups").exists());

        // Reopening is idempotent.
        let _db = Database::new(path_str).unwrap();
    }
}
