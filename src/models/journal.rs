use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journal {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Journal enriched with aggregate figures for the journal list view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalSummary {
    #[serde(flatten)]
    pub journal: Journal,
    pub trades_count: i64,
    pub win_rate: f64,
    pub profit_loss: f64,
    pub last_trade_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateJournalInput {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateJournalInput {
    pub name: Option<String>,
    pub description: Option<String>,
}
