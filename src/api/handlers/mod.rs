pub mod auth;
pub mod journals;
pub mod references;
pub mod stats;
pub mod trades;

use crate::actions::{journals::get_journal, Scope};
use crate::api::AppState;
use crate::error::AppResult;

/// Resolve a journal id into a full scope, verifying ownership. A journal
/// belonging to someone else reports NotFound rather than Forbidden.
pub(crate) fn scope_for(state: &AppState, user_id: &str, journal_id: &str) -> AppResult<Scope> {
    get_journal(&state.db, user_id, journal_id)?;
    Ok(Scope::new(user_id, journal_id))
}
