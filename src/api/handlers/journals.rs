use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::actions;
use crate::api::{cached_json, invalidate, AppState, AuthUser};
use crate::cache::configs;
use crate::error::AppResult;
use crate::models::{CreateJournalInput, UpdateJournalInput};

pub async fn list(
    auth: AuthUser,
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> AppResult<Response> {
    cached_json(&state, &uri, &headers, &auth.user.id, &configs::JOURNALS, || {
        let summaries = actions::journals::list_journal_summaries(&state.db, &auth.user.id)?;
        Ok(json!({ "journals": summaries }))
    })
}

pub async fn show(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(journal_id): Path<String>,
) -> AppResult<Response> {
    let journal = actions::journals::get_journal(&state.db, &auth.user.id, &journal_id)?;
    Ok(Json(json!({ "journal": journal })).into_response())
}

pub async fn create(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateJournalInput>,
) -> AppResult<Response> {
    let journal = actions::journals::create_journal(&state.db, &auth.user.id, &input)?;
    invalidate(&state, &["journals"]);
    Ok((StatusCode::CREATED, Json(json!({ "journal": journal }))).into_response())
}

pub async fn update(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(journal_id): Path<String>,
    Json(input): Json<UpdateJournalInput>,
) -> AppResult<Response> {
    let journal = actions::journals::update_journal(&state.db, &auth.user.id, &journal_id, &input)?;
    invalidate(&state, &["journals"]);
    Ok(Json(json!({ "journal": journal })).into_response())
}

pub async fn delete(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(journal_id): Path<String>,
) -> AppResult<Response> {
    actions::journals::delete_journal(&state.db, &auth.user.id, &journal_id)?;
    // The journal's trades and reference lists went with it.
    invalidate(&state, &["journals", "trades", "stats", "reference-data"]);
    Ok(StatusCode::NO_CONTENT.into_response())
}
