use axum::{extract::State, http::StatusCode, response::Response};
use tracing::error;

use crate::auth::AppState;
use crate::middleware::current_user;
use crate::session::Session;
use crate::views;

/// Messages shown on the home timeline.
pub const TIMELINE_LIMIT: u32 = 100;

/// Anonymous visitors go to the login page; pending notices stay queued
/// for it.
pub async fn homepage(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, StatusCode> {
    let Some(user) = current_user(&state, &session)? else {
        return Ok(views::found("/login"));
    };

    let messages = state.db.timeline(user.id, TIMELINE_LIMIT).map_err(|e| {
        error!("Failed to load timeline for user #{}: {}", user.id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let body = views::timeline(&user, &messages);
    Ok(views::page(session, Some(&user), "Warbler", &body))
}
