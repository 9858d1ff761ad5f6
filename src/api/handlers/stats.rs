use axum::extract::{Path, State};
use axum::http::{HeaderMap, Uri};
use axum::response::Response;
use serde_json::json;

use crate::actions;
use crate::api::{cached_json, AppState, AuthUser};
use crate::cache::configs;
use crate::error::AppResult;
use crate::models::TradeFilters;
use crate::stats;

pub async fn show(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(journal_id): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> AppResult<Response> {
    let scope = super::scope_for(&state, &auth.user.id, &journal_id)?;
    cached_json(&state, &uri, &headers, &auth.user.id, &configs::STATS, || {
        let trades = actions::trades::list_trades(&state.db, &scope, &TradeFilters::default())?;
        Ok(json!({
            "stats": stats::compute(&trades),
            "monthly_pnl": stats::monthly_pnl(&trades),
            "equity_curve": stats::cumulative_pnl(&trades),
            "calendar": stats::daily_buckets(&trades),
        }))
    })
}
