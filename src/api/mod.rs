//! HTTP surface: an `axum` router over the action layer, with the response
//! cache consulted on every cacheable GET.

pub mod handlers;

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::actions;
use crate::cache::{CacheConfig, CacheHeaders, CacheLookup, CachedRequest, Freshness, ResponseCache};
use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::User;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub cache: Arc<ResponseCache>,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(db),
            cache: Arc::new(ResponseCache::with_default_capacity()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/signup", post(handlers::auth::sign_up))
        .route("/api/auth/signin", post(handlers::auth::sign_in))
        .route("/api/auth/signout", post(handlers::auth::sign_out))
        .route("/api/auth/me", get(handlers::auth::me))
        .route(
            "/api/journals",
            get(handlers::journals::list).post(handlers::journals::create),
        )
        .route(
            "/api/journals/{journal_id}",
            get(handlers::journals::show)
                .patch(handlers::journals::update)
                .delete(handlers::journals::delete),
        )
        .route(
            "/api/journals/{journal_id}/assets",
            get(handlers::references::list_assets).post(handlers::references::add_asset),
        )
        .route(
            "/api/journals/{journal_id}/assets/{id}",
            axum::routing::delete(handlers::references::delete_asset),
        )
        .route(
            "/api/journals/{journal_id}/sessions",
            get(handlers::references::list_sessions).post(handlers::references::add_session),
        )
        .route(
            "/api/journals/{journal_id}/sessions/{id}",
            axum::routing::delete(handlers::references::delete_session),
        )
        .route(
            "/api/journals/{journal_id}/setups",
            get(handlers::references::list_setups).post(handlers::references::add_setup),
        )
        .route(
            "/api/journals/{journal_id}/setups/{id}",
            axum::routing::delete(handlers::references::delete_setup),
        )
        .route(
            "/api/journals/{journal_id}/trades",
            get(handlers::trades::list).post(handlers::trades::create),
        )
        .route(
            "/api/journals/{journal_id}/trades/{id}",
            get(handlers::trades::show)
                .patch(handlers::trades::update)
                .delete(handlers::trades::delete),
        )
        .route("/api/journals/{journal_id}/stats", get(handlers::stats::show))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The authenticated caller, resolved from the bearer token.
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AppError::NotAuthenticated)?;
        let user = actions::auth::current_user(&state.db, &token)?;
        Ok(AuthUser { user, token })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotAuthenticated | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) | AppError::Parse(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Duplicate { .. } | AppError::ReferencedByTrades { .. } => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Http(_) | AppError::Spreadsheet(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("Request failed: {}", self);
        }

        let mut body = json!({ "error": self.to_string() });
        if let Some(issues) = self.issues() {
            body["issues"] = serde_json::to_value(issues).unwrap_or(Value::Null);
        }
        (status, Json(body)).into_response()
    }
}

/// Build the cache lookup identity for a GET request.
fn cached_request(uri: &Uri, headers: &HeaderMap, user_id: &str) -> CachedRequest {
    let query = match uri.query() {
        Some(q) => format!("?{}", q),
        None => String::new(),
    };
    let mut request = CachedRequest::new(uri.path(), query).for_user(user_id);
    request.if_none_match = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    request.if_modified_since = headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| chrono::DateTime::parse_from_rfc2822(v).ok())
        .map(|dt| dt.timestamp_millis());
    request
}

fn http_date(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .unwrap_or_default()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

fn respond_with_headers(data: Value, headers: CacheHeaders, freshness: Freshness) -> Response {
    let status_header = match freshness {
        Freshness::Fresh => "fresh",
        Freshness::Stale => "stale",
    };
    (
        StatusCode::OK,
        [
            (header::ETAG.as_str(), headers.etag.clone()),
            (header::LAST_MODIFIED.as_str(), http_date(headers.last_modified)),
            (header::CACHE_CONTROL.as_str(), headers.cache_control.clone()),
            ("x-cache-status", status_header.to_string()),
        ],
        Json(data),
    )
        .into_response()
}

/// Serve a GET through the cache: conditional 304, cached hit (fresh or
/// stale), or compute + store on miss.
pub(crate) fn cached_json(
    state: &AppState,
    uri: &Uri,
    headers: &HeaderMap,
    user_id: &str,
    config: &CacheConfig,
    compute: impl FnOnce() -> AppResult<Value>,
) -> AppResult<Response> {
    let request = cached_request(uri, headers, user_id);

    match state.cache.get(&request, config) {
        Some(CacheLookup::NotModified) => Ok(StatusCode::NOT_MODIFIED.into_response()),
        Some(CacheLookup::Hit {
            data,
            headers,
            freshness,
        }) => Ok(respond_with_headers(data, headers, freshness)),
        None => {
            let data = compute()?;
            let stored = state.cache.set(&request, data.clone(), config);
            Ok(respond_with_headers(data, stored, Freshness::Fresh))
        }
    }
}

pub(crate) fn invalidate(state: &AppState, tags: &[&str]) {
    for tag in tags {
        let removed = state.cache.invalidate_by_tag(tag);
        if removed > 0 {
            log::debug!("Invalidated {} cached responses under '{}'", removed, tag);
        }
    }
}
