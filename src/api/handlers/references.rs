//! One generic handler set stamped out for the three reference categories.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::actions;
use crate::api::{cached_json, invalidate, AppState, AuthUser};
use crate::cache::configs;
use crate::error::AppResult;
use crate::models::ReferenceKind;

use super::scope_for;

#[derive(Debug, Deserialize)]
pub struct NameInput {
    pub name: String,
}

async fn list_kind(
    auth: AuthUser,
    state: AppState,
    journal_id: String,
    uri: Uri,
    headers: HeaderMap,
    kind: ReferenceKind,
) -> AppResult<Response> {
    let scope = scope_for(&state, &auth.user.id, &journal_id)?;
    cached_json(
        &state,
        &uri,
        &headers,
        &auth.user.id,
        &configs::REFERENCE_DATA,
        || {
            let items = actions::references::list_items(&state.db, &scope, kind)?;
            Ok(json!({ kind.table(): items }))
        },
    )
}

async fn add_kind(
    auth: AuthUser,
    state: AppState,
    journal_id: String,
    kind: ReferenceKind,
    input: NameInput,
) -> AppResult<Response> {
    let scope = scope_for(&state, &auth.user.id, &journal_id)?;
    let item = actions::references::add_item(&state.db, &scope, kind, &input.name)?;
    invalidate(&state, &["reference-data"]);
    Ok((StatusCode::CREATED, Json(json!({ "item": item }))).into_response())
}

async fn delete_kind(
    auth: AuthUser,
    state: AppState,
    journal_id: String,
    id: String,
    kind: ReferenceKind,
) -> AppResult<Response> {
    let scope = scope_for(&state, &auth.user.id, &journal_id)?;
    actions::references::delete_item(&state.db, &scope, kind, &id)?;
    invalidate(&state, &["reference-data"]);
    Ok(StatusCode::NO_CONTENT.into_response())
}

macro_rules! reference_handlers {
    ($list:ident, $add:ident, $delete:ident, $kind:expr) => {
        pub async fn $list(
            auth: AuthUser,
            State(state): State<AppState>,
            Path(journal_id): Path<String>,
            uri: Uri,
            headers: HeaderMap,
        ) -> AppResult<Response> {
            list_kind(auth, state, journal_id, uri, headers, $kind).await
        }

        pub async fn $add(
            auth: AuthUser,
            State(state): State<AppState>,
            Path(journal_id): Path<String>,
            Json(input): Json<NameInput>,
        ) -> AppResult<Response> {
            add_kind(auth, state, journal_id, $kind, input).await
        }

        pub async fn $delete(
            auth: AuthUser,
            State(state): State<AppState>,
            Path((journal_id, id)): Path<(String, String)>,
        ) -> AppResult<Response> {
            delete_kind(auth, state, journal_id, id, $kind).await
        }
    };
}

reference_handlers!(list_assets, add_asset, delete_asset, ReferenceKind::Asset);
reference_handlers!(list_sessions, add_session, delete_session, ReferenceKind::Session);
reference_handlers!(list_setups, add_setup, delete_setup, ReferenceKind::Setup);
