//! Trade CRUD. Reads join the reference tables so every trade carries its
//! resolved asset/session/setup names; updates write only the columns that
//! actually changed.

use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, AppResult, ValidationIssue};
use crate::models::{CreateTradeInput, ReferenceKind, Trade, TradeFilters, UpdateTradeInput};

use super::{lock_conn, now_millis, Scope};

const TRADE_COLUMNS: &str = "t.id, t.trade_date, t.asset_id, a.name, t.session_id, s.name,
        t.setup_id, p.name, t.risk_input, t.profit_loss_amount, t.tradingview_link,
        t.notes, t.duration_minutes, t.created_at";

const TRADE_JOINS: &str = "FROM trades t
        LEFT JOIN assets a ON a.id = t.asset_id
        LEFT JOIN sessions s ON s.id = t.session_id
        LEFT JOIN setups p ON p.id = t.setup_id";

fn map_trade(row: &rusqlite::Row) -> rusqlite::Result<Trade> {
    Ok(Trade {
        id: row.get(0)?,
        trade_date: row.get(1)?,
        asset_id: row.get(2)?,
        asset_name: row.get(3)?,
        session_id: row.get(4)?,
        session_name: row.get(5)?,
        setup_id: row.get(6)?,
        setup_name: row.get(7)?,
        risk_input: row.get(8)?,
        profit_loss_amount: row.get(9)?,
        tradingview_link: row.get(10)?,
        notes: row.get(11)?,
        duration_minutes: row.get(12)?,
        created_at: row.get(13)?,
    })
}

fn validate_trade_date(date: &str) -> Option<ValidationIssue> {
    if chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
        Some(ValidationIssue::new(
            "trade_date",
            "Date must be in YYYY-MM-DD format",
        ))
    } else {
        None
    }
}

/// Check that a submitted reference id exists inside the caller's scope.
fn check_ref(
    conn: &rusqlite::Connection,
    scope: &Scope,
    kind: ReferenceKind,
    id: &Option<String>,
) -> AppResult<Option<ValidationIssue>> {
    let Some(id) = id.as_deref().filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let exists: bool = conn.query_row(
        &format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1 AND user_id = ?2 AND journal_id = ?3)",
            kind.table()
        ),
        rusqlite::params![id, scope.user_id, scope.journal_id],
        |row| row.get(0),
    )?;
    if exists {
        Ok(None)
    } else {
        Ok(Some(ValidationIssue::new(
            kind.trade_column(),
            format!("Unknown {}", kind.label()),
        )))
    }
}

pub fn add_trade(db: &Database, scope: &Scope, input: &CreateTradeInput) -> AppResult<Trade> {
    let conn = lock_conn(db)?;

    let mut issues = Vec::new();
    if let Some(issue) = validate_trade_date(&input.trade_date) {
        issues.push(issue);
    }
    if input.risk_input.trim().is_empty() {
        issues.push(ValidationIssue::new("risk_input", "Risk is required"));
    }
    for (kind, id) in [
        (ReferenceKind::Asset, &input.asset_id),
        (ReferenceKind::Session, &input.session_id),
        (ReferenceKind::Setup, &input.setup_id),
    ] {
        if let Some(issue) = check_ref(&conn, scope, kind, id)? {
            issues.push(issue);
        }
    }
    if !issues.is_empty() {
        return Err(AppError::validation(issues));
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO trades (
            id, user_id, journal_id, trade_date, asset_id, session_id, setup_id,
            risk_input, profit_loss_amount, tradingview_link, notes, duration_minutes, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        rusqlite::params![
            id,
            scope.user_id,
            scope.journal_id,
            input.trade_date,
            input.asset_id.as_deref().filter(|v| !v.is_empty()),
            input.session_id.as_deref().filter(|v| !v.is_empty()),
            input.setup_id.as_deref().filter(|v| !v.is_empty()),
            input.risk_input.trim(),
            input.profit_loss_amount,
            input.tradingview_link.as_deref().filter(|v| !v.is_empty()),
            input.notes,
            input.duration_minutes,
            now_millis(),
        ],
    )?;
    drop(conn);

    get_trade(db, scope, &id)
}

pub fn get_trade(db: &Database, scope: &Scope, id: &str) -> AppResult<Trade> {
    let conn = lock_conn(db)?;
    conn.query_row(
        &format!(
            "SELECT {} {} WHERE t.id = ?1 AND t.user_id = ?2 AND t.journal_id = ?3",
            TRADE_COLUMNS, TRADE_JOINS
        ),
        rusqlite::params![id, scope.user_id, scope.journal_id],
        map_trade,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NotFound { entity: "Trade" },
        other => other.into(),
    })
}

/// Newest first, optionally windowed by date and paginated.
pub fn list_trades(db: &Database, scope: &Scope, filters: &TradeFilters) -> AppResult<Vec<Trade>> {
    let conn = lock_conn(db)?;

    let mut query = format!(
        "SELECT {} {} WHERE t.user_id = ?1 AND t.journal_id = ?2",
        TRADE_COLUMNS, TRADE_JOINS
    );
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![
        Box::new(scope.user_id.clone()),
        Box::new(scope.journal_id.clone()),
    ];

    if let Some(from) = &filters.date_from {
        query.push_str(&format!(" AND t.trade_date >= ?{}", params.len() + 1));
        params.push(Box::new(from.clone()));
    }
    if let Some(to) = &filters.date_to {
        query.push_str(&format!(" AND t.trade_date <= ?{}", params.len() + 1));
        params.push(Box::new(to.clone()));
    }

    query.push_str(" ORDER BY t.trade_date DESC, t.created_at DESC");

    if let (Some(page), Some(limit)) = (filters.page, filters.limit) {
        let offset = (page.max(1) - 1) * limit;
        query.push_str(&format!(
            " LIMIT ?{} OFFSET ?{}",
            params.len() + 1,
            params.len() + 2
        ));
        params.push(Box::new(limit));
        params.push(Box::new(offset));
    }

    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map(param_refs.as_slice(), map_trade)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn count_trades(db: &Database, scope: &Scope) -> AppResult<i64> {
    let conn = lock_conn(db)?;
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM trades WHERE user_id = ?1 AND journal_id = ?2",
        [&scope.user_id, &scope.journal_id],
        |row| row.get(0),
    )?)
}

/// Apply a partial edit. The edit is diffed against the stored row and only
/// changed columns are written; an edit that changes nothing touches nothing.
pub fn update_trade(
    db: &Database,
    scope: &Scope,
    id: &str,
    input: &UpdateTradeInput,
) -> AppResult<Trade> {
    let original = get_trade(db, scope, id)?;

    if let Some(date) = &input.trade_date {
        if let Some(issue) = validate_trade_date(date) {
            return Err(AppError::validation(vec![issue]));
        }
    }

    let changes = input.diff_against(&original);
    if changes.is_empty() {
        return Ok(original);
    }

    let conn = lock_conn(db)?;

    let mut issues = Vec::new();
    for (kind, submitted) in [
        (ReferenceKind::Asset, &input.asset_id),
        (ReferenceKind::Session, &input.session_id),
        (ReferenceKind::Setup, &input.setup_id),
    ] {
        if let Some(issue) = check_ref(&conn, scope, kind, submitted)? {
            issues.push(issue);
        }
    }
    if !issues.is_empty() {
        return Err(AppError::validation(issues));
    }

    let assignments: Vec<String> = changes
        .iter()
        .enumerate()
        .map(|(i, change)| format!("{} = ?{}", change.column(), i + 1))
        .collect();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> =
        changes.iter().map(|change| change.to_sql_value()).collect();

    let query = format!(
        "UPDATE trades SET {} WHERE id = ?{} AND user_id = ?{} AND journal_id = ?{}",
        assignments.join(", "),
        values.len() + 1,
        values.len() + 2,
        values.len() + 3,
    );
    values.push(Box::new(id.to_string()));
    values.push(Box::new(scope.user_id.clone()));
    values.push(Box::new(scope.journal_id.clone()));

    let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    conn.execute(&query, param_refs.as_slice())?;
    drop(conn);

    get_trade(db, scope, id)
}

pub fn delete_trade(db: &Database, scope: &Scope, id: &str) -> AppResult<()> {
    let conn = lock_conn(db)?;
    let deleted = conn.execute(
        "DELETE FROM trades WHERE id = ?1 AND user_id = ?2 AND journal_id = ?3",
        rusqlite::params![id, scope.user_id, scope.journal_id],
    )?;
    if deleted == 0 {
        return Err(AppError::NotFound { entity: "Trade" });
    }
    Ok(())
}
