//! Workbook import: first worksheet, header row skipped, fixed column
//! offsets. Bad rows are collected with their sheet row number; good rows go
//! through the normal add-trade path one at a time.

use calamine::{open_workbook, Data, Reader, Xlsx};
use chrono::NaiveDate;
use serde::Serialize;

use crate::actions::{references, trades, Scope};
use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{CreateTradeInput, ReferenceKind};

use super::columns;

#[derive(Debug, Clone, Serialize)]
pub struct RowError {
    /// 1-based sheet row number, header included.
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ImportOutcome {
    pub imported: usize,
    pub failed: usize,
    pub errors: Vec<RowError>,
}

/// A row lifted out of the sheet before name resolution.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedRow {
    pub trade_date: String,
    pub asset: String,
    pub session: Option<String>,
    pub risk: String,
    pub profit_loss: f64,
    pub setup: Option<String>,
    pub notes: Option<String>,
    pub link: Option<String>,
}

fn cell(row: &[Data], index: usize) -> Option<&Data> {
    row.get(index).filter(|d| !matches!(d, Data::Empty))
}

fn cell_str(row: &[Data], index: usize) -> Option<String> {
    let value = match cell(row, index)? {
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        _ => return None,
    };
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn cell_f64(row: &[Data], index: usize) -> Option<f64> {
    match cell(row, index)? {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    }
}

/// Excel serial date (days since 1899-12-30) to a calendar date.
fn serial_date(serial: f64) -> Option<NaiveDate> {
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(chrono::Duration::days(serial as i64))
}

fn cell_date(row: &[Data], index: usize) -> Option<String> {
    let date = match cell(row, index)? {
        Data::DateTime(dt) => serial_date(dt.as_f64())?,
        Data::Float(f) => serial_date(*f)?,
        Data::Int(i) => serial_date(*i as f64)?,
        Data::String(s) => {
            let s = s.trim();
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(s, "%d/%m/%Y"))
                .ok()?
        }
        _ => return None,
    };
    Some(date.format("%Y-%m-%d").to_string())
}

pub(crate) fn parse_row(row: &[Data]) -> Result<ParsedRow, String> {
    let trade_date = cell_date(row, columns::DATE).ok_or("Missing or invalid date")?;
    let asset = cell_str(row, columns::ASSET).ok_or("Missing asset")?;

    Ok(ParsedRow {
        trade_date,
        asset,
        session: cell_str(row, columns::SESSION),
        risk: cell_str(row, columns::RISK).unwrap_or_else(|| "N/A".to_string()),
        profit_loss: cell_f64(row, columns::PROFIT_LOSS).unwrap_or(0.0),
        setup: cell_str(row, columns::SETUP),
        notes: cell_str(row, columns::NOTES),
        link: cell_str(row, columns::LINK),
    })
}

/// Resolve a name against a reference list, ignoring case. A present but
/// unresolvable asset fails the row; sessions and setups fall back to none.
fn resolve(
    db: &Database,
    scope: &Scope,
    kind: ReferenceKind,
    name: &str,
) -> AppResult<Option<String>> {
    Ok(references::find_by_name(db, scope, kind, name)?.map(|item| item.id))
}

/// Import already-extracted data rows (everything after the header).
/// Row numbers in errors are sheet positions, so the first data row is 2.
pub fn import_rows(db: &Database, scope: &Scope, rows: &[Vec<Data>]) -> AppResult<ImportOutcome> {
    let mut outcome = ImportOutcome::default();

    for (index, row) in rows.iter().enumerate() {
        let row_number = index + 2;

        // Fully empty rows are padding, not data.
        if row.iter().all(|d| matches!(d, Data::Empty)) {
            continue;
        }

        let parsed = match parse_row(row) {
            Ok(parsed) => parsed,
            Err(message) => {
                outcome.failed += 1;
                outcome.errors.push(RowError {
                    row: row_number,
                    message,
                });
                continue;
            }
        };

        let Some(asset_id) = resolve(db, scope, ReferenceKind::Asset, &parsed.asset)? else {
            outcome.failed += 1;
            outcome.errors.push(RowError {
                row: row_number,
                message: format!("Unknown asset \"{}\"", parsed.asset),
            });
            continue;
        };

        let session_id = match &parsed.session {
            Some(name) => resolve(db, scope, ReferenceKind::Session, name)?,
            None => None,
        };
        let setup_id = match &parsed.setup {
            Some(name) => resolve(db, scope, ReferenceKind::Setup, name)?,
            None => None,
        };

        let input = CreateTradeInput {
            trade_date: parsed.trade_date,
            asset_id: Some(asset_id),
            session_id,
            setup_id,
            risk_input: parsed.risk,
            profit_loss_amount: parsed.profit_loss,
            tradingview_link: parsed.link,
            notes: parsed.notes,
            duration_minutes: None,
        };

        match trades::add_trade(db, scope, &input) {
            Ok(_) => outcome.imported += 1,
            Err(e) => {
                outcome.failed += 1;
                outcome.errors.push(RowError {
                    row: row_number,
                    message: e.to_string(),
                });
            }
        }
    }

    log::info!(
        "Sheet import finished: {} imported, {} failed",
        outcome.imported,
        outcome.failed
    );
    Ok(outcome)
}

/// Import the first worksheet of an xlsx file.
pub fn import_workbook(db: &Database, scope: &Scope, path: &str) -> AppResult<ImportOutcome> {
    let mut workbook = open_workbook::<Xlsx<std::io::BufReader<std::fs::File>>, _>(path)
        .map_err(|e| AppError::Spreadsheet(e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| AppError::Spreadsheet("Workbook has no sheets".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| AppError::Spreadsheet(e.to_string()))?;

    let rows: Vec<Vec<Data>> = range.rows().skip(1).map(|r| r.to_vec()).collect();
    import_rows(db, scope, &rows)
}
