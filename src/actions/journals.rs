//! Journal CRUD plus the summary aggregates shown on the journal list.

use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, AppResult, ValidationIssue};
use crate::models::{CreateJournalInput, Journal, JournalSummary, UpdateJournalInput};

use super::{lock_conn, now_millis};

fn map_journal(row: &rusqlite::Row) -> rusqlite::Result<Journal> {
    Ok(Journal {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

pub fn create_journal(
    db: &Database,
    user_id: &str,
    input: &CreateJournalInput,
) -> AppResult<Journal> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::validation(vec![ValidationIssue::new(
            "name",
            "Journal name is required",
        )]));
    }

    let now = now_millis();
    let journal = Journal {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        description: input
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(String::from),
        created_at: now,
        updated_at: now,
    };

    let conn = lock_conn(db)?;
    conn.execute(
        "INSERT INTO journals (id, user_id, name, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            journal.id,
            user_id,
            journal.name,
            journal.description,
            journal.created_at,
            journal.updated_at
        ],
    )?;
    Ok(journal)
}

pub fn get_journal(db: &Database, user_id: &str, journal_id: &str) -> AppResult<Journal> {
    let conn = lock_conn(db)?;
    conn.query_row(
        "SELECT id, name, description, created_at, updated_at
         FROM journals WHERE id = ?1 AND user_id = ?2",
        [journal_id, user_id],
        map_journal,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NotFound { entity: "Journal" },
        other => other.into(),
    })
}

pub fn list_journals(db: &Database, user_id: &str) -> AppResult<Vec<Journal>> {
    let conn = lock_conn(db)?;
    let mut stmt = conn.prepare(
        "SELECT id, name, description, created_at, updated_at
         FROM journals WHERE user_id = ?1 ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map([user_id], map_journal)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Journals with trade count, win rate over decided trades, total PnL, and
/// the most recent trade date. Computed in one pass per journal.
pub fn list_journal_summaries(db: &Database, user_id: &str) -> AppResult<Vec<JournalSummary>> {
    let journals = list_journals(db, user_id)?;
    let conn = lock_conn(db)?;

    let mut summaries = Vec::with_capacity(journals.len());
    for journal in journals {
        let (trades_count, wins, decided, profit_loss, last_trade_date) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN profit_loss_amount > 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN profit_loss_amount <> 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(profit_loss_amount), 0),
                    MAX(trade_date)
             FROM trades WHERE user_id = ?1 AND journal_id = ?2",
            [user_id, &journal.id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            },
        )?;

        let win_rate = if decided > 0 {
            wins as f64 / decided as f64 * 100.0
        } else {
            0.0
        };

        summaries.push(JournalSummary {
            journal,
            trades_count,
            win_rate,
            profit_loss,
            last_trade_date,
        });
    }
    Ok(summaries)
}

pub fn update_journal(
    db: &Database,
    user_id: &str,
    journal_id: &str,
    input: &UpdateJournalInput,
) -> AppResult<Journal> {
    let existing = get_journal(db, user_id, journal_id)?;

    let name = match &input.name {
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(AppError::validation(vec![ValidationIssue::new(
                    "name",
                    "Journal name is required",
                )]));
            }
            trimmed.to_string()
        }
        None => existing.name.clone(),
    };
    let description = match &input.description {
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        None => existing.description.clone(),
    };

    let conn = lock_conn(db)?;
    conn.execute(
        "UPDATE journals SET name = ?1, description = ?2, updated_at = ?3
         WHERE id = ?4 AND user_id = ?5",
        rusqlite::params![name, description, now_millis(), journal_id, user_id],
    )?;
    drop(conn);

    get_journal(db, user_id, journal_id)
}

/// Delete a journal and everything inside it.
pub fn delete_journal(db: &Database, user_id: &str, journal_id: &str) -> AppResult<()> {
    // Ownership check first so a foreign id reports NotFound, not silence.
    get_journal(db, user_id, journal_id)?;

    let conn = lock_conn(db)?;
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM trades WHERE journal_id = ?1 AND user_id = ?2",
        [journal_id, user_id],
    )?;
    for table in ["assets", "sessions", "setups"] {
        tx.execute(
            &format!("DELETE FROM {} WHERE journal_id = ?1 AND user_id = ?2", table),
            [journal_id, user_id],
        )?;
    }
    tx.execute(
        "DELETE FROM journals WHERE id = ?1 AND user_id = ?2",
        [journal_id, user_id],
    )?;
    tx.commit()?;
    Ok(())
}
