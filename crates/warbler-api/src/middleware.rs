use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use warbler_db::User;

use crate::auth::AppState;
use crate::session::{FlashLevel, Session};
use crate::views;

pub const ACCESS_UNAUTHORIZED: &str = "Access unauthorized.";

/// The session's user, inserted by [`require_login`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Resolve the session to a user. A session naming a user that no longer
/// exists counts as anonymous.
pub fn current_user(state: &AppState, session: &Session) -> Result<Option<User>, StatusCode> {
    let Some(id) = session.user_id() else {
        return Ok(None);
    };

    state.db.get_user(id).map_err(|e| {
        error!("Failed to load session user #{}: {}", id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Refuse anonymous requests: queue the notice and send them home.
pub fn deny(mut session: Session) -> Response {
    session.flash(FlashLevel::Danger, ACCESS_UNAUTHORIZED);
    (session, views::found("/")).into_response()
}

/// Gate for routes that act on behalf of the logged-in user.
pub async fn require_login(
    State(state): State<AppState>,
    session: Session,
    mut req: Request,
    next: Next,
) -> Response {
    let user = match current_user(&state, &session) {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!("Unauthorized {} {}", req.method(), req.uri().path());
            return deny(session);
        }
        Err(status) => return status.into_response(),
    };

    req.extensions_mut().insert(CurrentUser(user));
    next.run(req).await
}
