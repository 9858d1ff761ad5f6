//! CSV export in the sheet's fixed layout: labels at the group-start
//! columns, data at the same offsets, blank padding in between.

use crate::error::{AppError, AppResult};
use crate::models::Trade;

use super::columns;

const LABELS: [(usize, &str); 8] = [
    (columns::DATE, "Date"),
    (columns::ASSET, "Actif"),
    (columns::SESSION, "Session"),
    (columns::RISK, "Risk"),
    (columns::PROFIT_LOSS, "Profit"),
    (columns::SETUP, "Setup"),
    (columns::NOTES, "Notes"),
    (columns::LINK, "Lien"),
];

fn blank_record() -> Vec<String> {
    vec![String::new(); columns::ROW_WIDTH]
}

fn trade_record(trade: &Trade) -> Vec<String> {
    let mut record = blank_record();
    record[columns::DATE] = trade.trade_date.clone();
    record[columns::ASSET] = trade.asset_name.clone().unwrap_or_default();
    record[columns::SESSION] = trade.session_name.clone().unwrap_or_default();
    record[columns::RISK] = trade.risk_input.clone();
    record[columns::PROFIT_LOSS] = trade.profit_loss_amount.to_string();
    record[columns::SETUP] = trade.setup_name.clone().unwrap_or_default();
    record[columns::NOTES] = trade.notes.clone().unwrap_or_default();
    record[columns::LINK] = trade.tradingview_link.clone().unwrap_or_default();
    record
}

/// Render trades as CSV text in the fixed sheet layout.
pub fn export_trades(trades: &[Trade]) -> AppResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = blank_record();
    for (index, label) in LABELS {
        header[index] = label.to_string();
    }
    writer
        .write_record(&header)
        .map_err(|e| AppError::Spreadsheet(e.to_string()))?;

    for trade in trades {
        writer
            .write_record(&trade_record(trade))
            .map_err(|e| AppError::Spreadsheet(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Spreadsheet(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| AppError::Spreadsheet(e.to_string()))
}
