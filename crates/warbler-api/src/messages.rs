use axum::{
    Extension, Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, info, warn};

use warbler_db::DbError;

use crate::auth::AppState;
use crate::forms::MessageForm;
use crate::middleware::{CurrentUser, current_user, deny};
use crate::session::{FlashLevel, Session};
use crate::views;

pub async fn new_message_form(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    session: Session,
) -> Response {
    views::page(session, Some(&user), "New message", &views::message_form(""))
}

/// Authorship is the session user; a `user_id` in the form is only
/// compared and logged.
pub async fn create_message(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    mut session: Session,
    Form(form): Form<MessageForm>,
) -> Result<Response, StatusCode> {
    if let Some(claimed) = form.user_id.as_deref().filter(|v| !v.is_empty()) {
        if claimed.parse::<i64>().ok() != Some(user.id) {
            warn!(
                "User #{} submitted a message claiming user_id '{}'; ignored",
                user.id, claimed
            );
        }
    }

    match state.db.create_message(user.id, &form.text) {
        Ok(_) => Ok((session, views::found(&format!("/users/{}", user.id))).into_response()),
        Err(DbError::Validation(msg)) => {
            session.flash(FlashLevel::Danger, msg);
            let body = views::message_form(&form.text);
            Ok(views::page(session, Some(&user), "New message", &body))
        }
        Err(e) => {
            error!("Failed to create message for user #{}: {}", user.id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn show_message(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    session: Session,
) -> Result<Response, StatusCode> {
    let message = state
        .db
        .get_message(message_id)
        .map_err(|e| {
            error!("Failed to load message #{}: {}", message_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let viewer = current_user(&state, &session)?;
    let body = views::message_detail(&message, viewer.as_ref());
    Ok(views::page(session, viewer.as_ref(), "Message", &body))
}

/// Only the author may delete; anyone else is treated as unauthorized.
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(message_id): Path<i64>,
    session: Session,
) -> Result<Response, StatusCode> {
    let message = state
        .db
        .get_message(message_id)
        .map_err(|e| {
            error!("Failed to load message #{}: {}", message_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    if message.user_id != user.id {
        warn!(
            "User #{} tried to delete message #{} owned by #{}",
            user.id, message.id, message.user_id
        );
        return Ok(deny(session));
    }

    state.db.delete_message(message.id).map_err(|e| {
        error!("Failed to delete message #{}: {}", message.id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    info!("User #{} deleted message #{}", user.id, message.id);

    Ok((session, views::found(&format!("/users/{}", user.id))).into_response())
}
