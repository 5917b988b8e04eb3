use axum::{
    Extension, Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, info, warn};

use warbler_db::{DbError, ProfileUpdate, User};

use crate::auth::AppState;
use crate::forms::{ProfileForm, SearchQuery};
use crate::middleware::{CurrentUser, current_user};
use crate::session::{FlashLevel, Session};
use crate::views::{self, ProfileStats, Relation};

/// Messages listed on a profile page.
pub const PROFILE_MESSAGE_LIMIT: u32 = 100;

fn internal(context: &str, e: DbError) -> StatusCode {
    error!("{}: {}", context, e);
    StatusCode::INTERNAL_SERVER_ERROR
}

fn load_user(state: &AppState, user_id: i64) -> Result<User, StatusCode> {
    state
        .db
        .get_user(user_id)
        .map_err(|e| internal("Failed to load user", e))?
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
    session: Session,
) -> Result<Response, StatusCode> {
    let users = state
        .db
        .search_users(query.q.as_deref())
        .map_err(|e| internal("User search failed", e))?;

    let viewer = current_user(&state, &session)?;
    let body = views::user_index(&users, query.q.as_deref());
    Ok(views::page(session, viewer.as_ref(), "Users", &body))
}

pub async fn show_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    session: Session,
) -> Result<Response, StatusCode> {
    let user = load_user(&state, user_id)?;
    let viewer = current_user(&state, &session)?;

    let messages = state
        .db
        .messages_for_user(user.id, PROFILE_MESSAGE_LIMIT)
        .map_err(|e| internal("Failed to load messages", e))?;
    let stats = ProfileStats {
        messages: state
            .db
            .message_count(user.id)
            .map_err(|e| internal("Failed to count messages", e))?,
        following: state
            .db
            .following_count(user.id)
            .map_err(|e| internal("Failed to count following", e))?,
        followers: state
            .db
            .follower_count(user.id)
            .map_err(|e| internal("Failed to count followers", e))?,
    };

    let relation = match &viewer {
        None => Relation::Anonymous,
        Some(v) if v.id == user.id => Relation::Own,
        Some(v) => {
            let follows = state
                .db
                .is_following(v.id, user.id)
                .map_err(|e| internal("Failed to check follow", e))?;
            if follows {
                Relation::Following
            } else {
                Relation::NotFollowing
            }
        }
    };

    let body = views::profile(&user, &stats, relation, &messages);
    Ok(views::page(session, viewer.as_ref(), &user.username, &body))
}

pub async fn show_following(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
    session: Session,
) -> Result<Response, StatusCode> {
    let user = load_user(&state, user_id)?;
    let following = state
        .db
        .following(user.id)
        .map_err(|e| internal("Failed to list following", e))?;

    let body = views::follow_list(&user, "Following", &following);
    Ok(views::page(session, Some(&viewer), "Following", &body))
}

pub async fn show_followers(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
    session: Session,
) -> Result<Response, StatusCode> {
    let user = load_user(&state, user_id)?;
    let followers = state
        .db
        .followers(user.id)
        .map_err(|e| internal("Failed to list followers", e))?;

    let body = views::follow_list(&user, "Followers", &followers);
    Ok(views::page(session, Some(&viewer), "Followers", &body))
}

pub async fn add_follow(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
    session: Session,
) -> Result<Response, StatusCode> {
    let followed = load_user(&state, user_id)?;
    if state
        .db
        .follow(viewer.id, followed.id)
        .map_err(|e| internal("Failed to follow", e))?
    {
        info!("User #{} now follows #{}", viewer.id, followed.id);
    }

    Ok((session, views::found(&format!("/users/{}/following", viewer.id))).into_response())
}

pub async fn stop_following(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
    session: Session,
) -> Result<Response, StatusCode> {
    if state
        .db
        .unfollow(viewer.id, user_id)
        .map_err(|e| internal("Failed to unfollow", e))?
    {
        info!("User #{} stopped following #{}", viewer.id, user_id);
    }

    Ok((session, views::found(&format!("/users/{}/following", viewer.id))).into_response())
}

pub async fn edit_profile_form(
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    session: Session,
) -> Response {
    let body = views::profile_form(&viewer);
    views::page(session, Some(&viewer), "Edit profile", &body)
}

/// Changes require the current password.
pub async fn edit_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    mut session: Session,
    Form(form): Form<ProfileForm>,
) -> Result<Response, StatusCode> {
    let db = state.clone();
    let username = viewer.username.clone();
    let password = form.password.clone();
    let confirmed = tokio::task::spawn_blocking(move || db.db.authenticate(&username, &password))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| internal("Password check failed", e))?;

    if confirmed.is_none() {
        warn!("User #{} failed password check on profile edit", viewer.id);
        session.flash(FlashLevel::Danger, "Wrong password, please try again.");
        return Ok((session, views::found("/")).into_response());
    }

    let update = ProfileUpdate {
        username: form.username,
        email: form.email,
        image_url: form.image_url,
        header_image_url: form.header_image_url,
        bio: form.bio,
        location: form.location,
    };

    match state.db.update_profile(viewer.id, &update) {
        Ok(user) => Ok((session, views::found(&format!("/users/{}", user.id))).into_response()),
        Err(DbError::Validation(msg)) => {
            session.flash(FlashLevel::Danger, msg);
            let body = views::profile_form(&viewer);
            Ok(views::page(session, Some(&viewer), "Edit profile", &body))
        }
        Err(e) => Err(internal("Profile update failed", e)),
    }
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    mut session: Session,
) -> Result<Response, StatusCode> {
    state
        .db
        .delete_user(viewer.id)
        .map_err(|e| internal("Failed to delete user", e))?;

    session.logout();
    Ok((session, views::found("/signup")).into_response())
}
