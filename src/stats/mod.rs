//! Pure aggregation over trade lists. Deterministic, side-effect free;
//! everything here is a linear scan.

use crate::models::Trade;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate figures for a set of trades. Ratios that have no defined value
/// (win rate with no decided trades, profit factor with zero gross loss) are
/// `None` and render as "N/A".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub breakevens: usize,
    /// Percentage in [0, 100], over non-breakeven trades only.
    pub win_rate: Option<f64>,
    pub total_pnl: f64,
    pub average_pnl: Option<f64>,
    pub average_win: Option<f64>,
    pub average_loss: Option<f64>,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: Option<f64>,
    pub best_trade: Option<f64>,
    pub worst_trade: Option<f64>,
}

pub fn compute(trades: &[Trade]) -> TradeStats {
    let total_trades = trades.len();
    let mut wins = 0;
    let mut losses = 0;
    let mut breakevens = 0;
    let mut total_pnl = 0.0;
    let mut gross_profit = 0.0;
    let mut gross_loss = 0.0;
    let mut best_trade: Option<f64> = None;
    let mut worst_trade: Option<f64> = None;

    for trade in trades {
        let pnl = trade.profit_loss_amount;
        total_pnl += pnl;

        if pnl > 0.0 {
            wins += 1;
            gross_profit += pnl;
        } else if pnl < 0.0 {
            losses += 1;
            gross_loss += pnl.abs();
        } else {
            breakevens += 1;
        }

        best_trade = Some(best_trade.map_or(pnl, |b: f64| b.max(pnl)));
        worst_trade = Some(worst_trade.map_or(pnl, |w: f64| w.min(pnl)));
    }

    let decided = wins + losses;
    let win_rate = if decided > 0 {
        Some(wins as f64 / decided as f64 * 100.0)
    } else {
        None
    };

    let average_pnl = if total_trades > 0 {
        Some(total_pnl / total_trades as f64)
    } else {
        None
    };

    let average_win = if wins > 0 {
        Some(gross_profit / wins as f64)
    } else {
        None
    };

    let average_loss = if losses > 0 {
        Some(gross_loss / losses as f64)
    } else {
        None
    };

    let profit_factor = if gross_loss > 0.0 {
        Some(gross_profit / gross_loss)
    } else {
        None
    };

    TradeStats {
        total_trades,
        wins,
        losses,
        breakevens,
        win_rate,
        total_pnl,
        average_pnl,
        average_win,
        average_loss,
        gross_profit,
        gross_loss,
        profit_factor,
        best_trade,
        worst_trade,
    }
}

/// One calendar-month bucket, keyed by the trade date (not creation time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPnl {
    /// "YYYY-MM"
    pub month: String,
    pub pnl: f64,
    pub trade_count: usize,
}

/// Sum PnL per calendar month, chronologically sorted. Trades with an
/// unparseable date are skipped.
pub fn monthly_pnl(trades: &[Trade]) -> Vec<MonthlyPnl> {
    let mut buckets: BTreeMap<String, (f64, usize)> = BTreeMap::new();

    for trade in trades {
        let Some(date) = parse_trade_date(&trade.trade_date) else {
            continue;
        };
        let month = date.format("%Y-%m").to_string();
        let entry = buckets.entry(month).or_insert((0.0, 0));
        entry.0 += trade.profit_loss_amount;
        entry.1 += 1;
    }

    buckets
        .into_iter()
        .map(|(month, (pnl, trade_count))| MonthlyPnl {
            month,
            pnl,
            trade_count,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    /// "YYYY-MM-DD"
    pub date: String,
    pub cumulative_pnl: f64,
    pub daily_pnl: f64,
    pub trade_count: usize,
}

/// Per-day cumulative PnL series for the equity-curve chart.
pub fn cumulative_pnl(trades: &[Trade]) -> Vec<EquityPoint> {
    let mut daily: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();

    for trade in trades {
        let Some(date) = parse_trade_date(&trade.trade_date) else {
            continue;
        };
        let entry = daily.entry(date).or_insert((0.0, 0));
        entry.0 += trade.profit_loss_amount;
        entry.1 += 1;
    }

    let mut running = 0.0;
    daily
        .into_iter()
        .map(|(date, (daily_pnl, trade_count))| {
            running += daily_pnl;
            EquityPoint {
                date: date.format("%Y-%m-%d").to_string(),
                cumulative_pnl: running,
                daily_pnl,
                trade_count,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DaySummary {
    pub pnl: f64,
    pub trade_count: usize,
}

/// Bucket trades by calendar day for the calendar grid.
pub fn daily_buckets(trades: &[Trade]) -> BTreeMap<NaiveDate, DaySummary> {
    let mut days: BTreeMap<NaiveDate, DaySummary> = BTreeMap::new();

    for trade in trades {
        let Some(date) = parse_trade_date(&trade.trade_date) else {
            continue;
        };
        let summary = days.entry(date).or_default();
        summary.pnl += trade.profit_loss_amount;
        summary.trade_count += 1;
    }

    days
}

fn parse_trade_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}
