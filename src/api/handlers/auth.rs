use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::actions;
use crate::api::{AppState, AuthUser};
use crate::error::AppResult;
use crate::models::{SignInInput, SignUpInput};

pub async fn sign_up(
    State(state): State<AppState>,
    Json(input): Json<SignUpInput>,
) -> AppResult<Response> {
    let (user, session) = actions::auth::sign_up(&state.db, &input)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "user": user, "token": session.token })),
    )
        .into_response())
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(input): Json<SignInInput>,
) -> AppResult<Response> {
    let (user, session) = actions::auth::sign_in(&state.db, &input)?;
    Ok(Json(json!({ "user": user, "token": session.token })).into_response())
}

pub async fn sign_out(auth: AuthUser, State(state): State<AppState>) -> AppResult<Response> {
    actions::auth::sign_out(&state.db, &auth.token)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn me(auth: AuthUser) -> Response {
    Json(json!({ "user": auth.user })).into_response()
}
