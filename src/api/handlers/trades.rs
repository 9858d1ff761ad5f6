use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::actions;
use crate::api::{cached_json, invalidate, AppState, AuthUser};
use crate::cache::configs;
use crate::error::AppResult;
use crate::models::{CreateTradeInput, TradeFilters, UpdateTradeInput};

use super::scope_for;

/// Tags touched by any trade mutation: the trade lists and every aggregate
/// derived from them.
const TRADE_TAGS: &[&str] = &["trades", "stats", "journals"];

pub async fn list(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(journal_id): Path<String>,
    Query(filters): Query<TradeFilters>,
    uri: Uri,
    headers: HeaderMap,
) -> AppResult<Response> {
    let scope = scope_for(&state, &auth.user.id, &journal_id)?;
    cached_json(&state, &uri, &headers, &auth.user.id, &configs::TRADES, || {
        let trades = actions::trades::list_trades(&state.db, &scope, &filters)?;
        let total = actions::trades::count_trades(&state.db, &scope)?;
        Ok(json!({ "trades": trades, "total": total }))
    })
}

pub async fn show(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((journal_id, id)): Path<(String, String)>,
) -> AppResult<Response> {
    let scope = scope_for(&state, &auth.user.id, &journal_id)?;
    let trade = actions::trades::get_trade(&state.db, &scope, &id)?;
    Ok(Json(json!({ "trade": trade })).into_response())
}

pub async fn create(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(journal_id): Path<String>,
    Json(input): Json<CreateTradeInput>,
) -> AppResult<Response> {
    let scope = scope_for(&state, &auth.user.id, &journal_id)?;
    let trade = actions::trades::add_trade(&state.db, &scope, &input)?;
    invalidate(&state, TRADE_TAGS);
    Ok((StatusCode::CREATED, Json(json!({ "trade": trade }))).into_response())
}

pub async fn update(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((journal_id, id)): Path<(String, String)>,
    Json(input): Json<UpdateTradeInput>,
) -> AppResult<Response> {
    let scope = scope_for(&state, &auth.user.id, &journal_id)?;
    let trade = actions::trades::update_trade(&state.db, &scope, &id, &input)?;
    invalidate(&state, TRADE_TAGS);
    Ok(Json(json!({ "trade": trade })).into_response())
}

pub async fn delete(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((journal_id, id)): Path<(String, String)>,
) -> AppResult<Response> {
    let scope = scope_for(&state, &auth.user.id, &journal_id)?;
    actions::trades::delete_trade(&state.db, &scope, &id)?;
    invalidate(&state, TRADE_TAGS);
    Ok(StatusCode::NO_CONTENT.into_response())
}
