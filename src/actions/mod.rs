//! Server-side actions. Every entry point takes an authenticated scope and
//! goes straight to SQLite; the HTTP layer is a thin shell over these.

pub mod auth;
pub mod journals;
pub mod references;
pub mod trades;

use crate::db::Database;
use crate::error::{AppError, AppResult};
use rusqlite::Connection;
use std::sync::MutexGuard;

/// Identity plus journal selection. All journal-scoped reads and writes filter
/// on both ids, so one user can never touch another's rows.
#[derive(Debug, Clone)]
pub struct Scope {
    pub user_id: String,
    pub journal_id: String,
}

impl Scope {
    pub fn new(user_id: impl Into<String>, journal_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            journal_id: journal_id.into(),
        }
    }
}

pub(crate) fn lock_conn(db: &Database) -> AppResult<MutexGuard<'_, Connection>> {
    db.conn
        .lock()
        .map_err(|e| AppError::Database(format!("Connection lock poisoned: {}", e)))
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
