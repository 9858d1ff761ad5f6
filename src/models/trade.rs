use serde::{Deserialize, Serialize};

/// One logged position outcome. `profit_loss_amount` is a signed percentage:
/// positive is a win, negative a loss, zero breakeven.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub trade_date: String,
    pub asset_id: Option<String>,
    pub asset_name: Option<String>,
    pub session_id: Option<String>,
    pub session_name: Option<String>,
    pub setup_id: Option<String>,
    pub setup_name: Option<String>,
    pub risk_input: String,
    pub profit_loss_amount: f64,
    pub tradingview_link: Option<String>,
    pub notes: Option<String>,
    pub duration_minutes: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTradeInput {
    pub trade_date: String,
    pub asset_id: Option<String>,
    pub session_id: Option<String>,
    pub setup_id: Option<String>,
    pub risk_input: String,
    pub profit_loss_amount: f64,
    pub tradingview_link: Option<String>,
    pub notes: Option<String>,
    pub duration_minutes: Option<i64>,
}

/// Partial trade edit. `None` means "field not submitted"; for the nullable
/// reference columns an empty string clears the link.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTradeInput {
    pub trade_date: Option<String>,
    pub asset_id: Option<String>,
    pub session_id: Option<String>,
    pub setup_id: Option<String>,
    pub risk_input: Option<String>,
    pub profit_loss_amount: Option<f64>,
    pub tradingview_link: Option<String>,
    pub notes: Option<String>,
    pub duration_minutes: Option<i64>,
}

/// A single changed column produced by diffing an edit against the stored row.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeFieldChange {
    TradeDate(String),
    AssetId(Option<String>),
    SessionId(Option<String>),
    SetupId(Option<String>),
    RiskInput(String),
    ProfitLossAmount(f64),
    TradingviewLink(Option<String>),
    Notes(Option<String>),
    DurationMinutes(Option<i64>),
}

impl TradeFieldChange {
    pub fn column(&self) -> &'static str {
        match self {
            TradeFieldChange::TradeDate(_) => "trade_date",
            TradeFieldChange::AssetId(_) => "asset_id",
            TradeFieldChange::SessionId(_) => "session_id",
            TradeFieldChange::SetupId(_) => "setup_id",
            TradeFieldChange::RiskInput(_) => "risk_input",
            TradeFieldChange::ProfitLossAmount(_) => "profit_loss_amount",
            TradeFieldChange::TradingviewLink(_) => "tradingview_link",
            TradeFieldChange::Notes(_) => "notes",
            TradeFieldChange::DurationMinutes(_) => "duration_minutes",
        }
    }

    pub fn to_sql_value(&self) -> Box<dyn rusqlite::ToSql> {
        match self {
            TradeFieldChange::TradeDate(v) => Box::new(v.clone()),
            TradeFieldChange::AssetId(v) => Box::new(v.clone()),
            TradeFieldChange::SessionId(v) => Box::new(v.clone()),
            TradeFieldChange::SetupId(v) => Box::new(v.clone()),
            TradeFieldChange::RiskInput(v) => Box::new(v.clone()),
            TradeFieldChange::ProfitLossAmount(v) => Box::new(*v),
            TradeFieldChange::TradingviewLink(v) => Box::new(v.clone()),
            TradeFieldChange::Notes(v) => Box::new(v.clone()),
            TradeFieldChange::DurationMinutes(v) => Box::new(*v),
        }
    }
}

/// Empty string on a reference id means "clear the link".
fn normalize_ref(value: &Option<String>) -> Option<Option<String>> {
    value.as_ref().map(|v| {
        if v.is_empty() {
            None
        } else {
            Some(v.clone())
        }
    })
}

fn normalize_text(value: &Option<String>) -> Option<Option<String>> {
    value.as_ref().map(|v| {
        if v.is_empty() {
            None
        } else {
            Some(v.clone())
        }
    })
}

impl UpdateTradeInput {
    /// Compare each submitted field against the stored trade; only fields that
    /// actually changed are returned. An empty vec means there is nothing to
    /// write.
    pub fn diff_against(&self, original: &Trade) -> Vec<TradeFieldChange> {
        let mut changes = Vec::new();

        if let Some(date) = &self.trade_date {
            if *date != original.trade_date {
                changes.push(TradeFieldChange::TradeDate(date.clone()));
            }
        }
        if let Some(asset) = normalize_ref(&self.asset_id) {
            if asset != original.asset_id {
                changes.push(TradeFieldChange::AssetId(asset));
            }
        }
        if let Some(session) = normalize_ref(&self.session_id) {
            if session != original.session_id {
                changes.push(TradeFieldChange::SessionId(session));
            }
        }
        if let Some(setup) = normalize_ref(&self.setup_id) {
            if setup != original.setup_id {
                changes.push(TradeFieldChange::SetupId(setup));
            }
        }
        if let Some(risk) = &self.risk_input {
            if *risk != original.risk_input {
                changes.push(TradeFieldChange::RiskInput(risk.clone()));
            }
        }
        if let Some(pnl) = self.profit_loss_amount {
            if pnl != original.profit_loss_amount {
                changes.push(TradeFieldChange::ProfitLossAmount(pnl));
            }
        }
        if let Some(link) = normalize_text(&self.tradingview_link) {
            if link != original.tradingview_link {
                changes.push(TradeFieldChange::TradingviewLink(link));
            }
        }
        if let Some(notes) = &self.notes {
            let notes = Some(notes.clone());
            if notes != original.notes {
                changes.push(TradeFieldChange::Notes(notes));
            }
        }
        if let Some(duration) = self.duration_minutes {
            let duration = Some(duration);
            if duration != original.duration_minutes {
                changes.push(TradeFieldChange::DurationMinutes(duration));
            }
        }

        changes
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeFilters {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}
