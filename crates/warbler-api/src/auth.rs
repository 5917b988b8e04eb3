use std::sync::Arc;

use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, info, warn};

use warbler_db::{Database, DbError};

use crate::forms::{LoginForm, SignupForm};
use crate::middleware::current_user;
use crate::session::{FlashLevel, Session, SessionKeys};
use crate::views;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub sessions: Arc<SessionKeys>,
}

impl AppStateInner {
    pub fn new(db: Database, sessions: SessionKeys) -> AppState {
        Arc::new(Self {
            db,
            sessions: Arc::new(sessions),
        })
    }
}

pub const MIN_PASSWORD_CHARS: usize = 6;

pub async fn signup_form(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, StatusCode> {
    let viewer = current_user(&state, &session)?;
    Ok(views::page(session, viewer.as_ref(), "Sign up", &views::signup_form("", "", "")))
}

pub async fn signup(
    State(state): State<AppState>,
    mut session: Session,
    Form(form): Form<SignupForm>,
) -> Result<Response, StatusCode> {
    let retry = |mut session: Session, form: &SignupForm, msg: String| {
        session.flash(FlashLevel::Danger, msg);
        let body = views::signup_form(
            &form.username,
            &form.email,
            form.image_url.as_deref().unwrap_or_default(),
        );
        views::page(session, None, "Sign up", &body)
    };

    if form.password.chars().count() < MIN_PASSWORD_CHARS {
        let msg = format!("Password must be at least {MIN_PASSWORD_CHARS} characters.");
        return Ok(retry(session, &form, msg));
    }

    // Argon2 runs on the blocking pool
    let db = state.clone();
    let (result, form) = tokio::task::spawn_blocking(move || {
        let result = db.db.signup(
            &form.username,
            &form.email,
            &form.password,
            form.image_url.as_deref(),
        );
        (result, form)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    match result {
        Ok(user) => {
            session.login(user.id);
            Ok((session, views::found("/")).into_response())
        }
        Err(DbError::Validation(msg)) => Ok(retry(session, &form, msg)),
        Err(e) => {
            error!("Signup failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn login_form(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, StatusCode> {
    let viewer = current_user(&state, &session)?;
    Ok(views::page(session, viewer.as_ref(), "Log in", &views::login_form("")))
}

pub async fn login(
    State(state): State<AppState>,
    mut session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, StatusCode> {
    let db = state.clone();
    let (user, form) = tokio::task::spawn_blocking(move || {
        (db.db.authenticate(&form.username, &form.password), form)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let user = user.map_err(|e| {
        error!("Login lookup failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    match user {
        Some(user) => {
            info!("User #{} logged in", user.id);
            session.login(user.id);
            session.flash(FlashLevel::Success, format!("Hello, {}!", user.username));
            Ok((session, views::found("/")).into_response())
        }
        None => {
            warn!("Failed login for '{}'", form.username);
            session.flash(FlashLevel::Danger, "Invalid credentials.");
            Ok(views::page(session, None, "Log in", &views::login_form(&form.username)))
        }
    }
}

pub async fn logout(mut session: Session) -> Response {
    session.logout();
    session.flash(FlashLevel::Success, "You have successfully logged out.");
    (session, views::found("/login")).into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::test_support::TestApp;

    #[tokio::test]
    async fn signup_logs_the_new_user_in() {
        let mut app = TestApp::new();

        let resp = app
            .post_form("/signup", "username=testuser&email=test%40test.com&password=HASHED_PASSWORD&image_url=")
            .await;
        assert_eq!(resp.status, StatusCode::FOUND);
        assert_eq!(resp.location.as_deref(), Some("/"));

        let user = app.state.db.get_user_by_username("testuser").unwrap().unwrap();
        assert_ne!(user.password, "HASHED_PASSWORD");

        let home = app.get("/").await;
        assert_eq!(home.status, StatusCode::OK);
        assert!(home.body.contains("@testuser"));
    }

    #[tokio::test]
    async fn duplicate_signup_re_renders_with_notice() {
        let mut app = TestApp::new();
        app.signup("testuser", "HASHED_PASSWORD");

        let resp = app
            .post_form("/signup", "username=testuser&email=other%40test.com&password=HASHED_PASSWORD")
            .await;
        assert_eq!(resp.status, StatusCode::OK);
        assert!(resp.body.contains("Username already taken"));
        assert!(resp.body.contains(r#"value="testuser""#));
    }

    #[tokio::test]
    async fn blank_username_or_email_re_renders_with_notice() {
        let mut app = TestApp::new();

        let resp = app
            .post_form("/signup", "username=&email=test%40test.com&password=HASHED_PASSWORD")
            .await;
        assert_eq!(resp.status, StatusCode::OK);
        assert!(resp.body.contains("Username is required"));
        assert!(resp.body.contains(r#"value="test@test.com""#));

        let resp = app
            .post_form("/signup", "username=testuser&email=+&password=HASHED_PASSWORD")
            .await;
        assert_eq!(resp.status, StatusCode::OK);
        assert!(resp.body.contains("Email is required"));
        assert!(resp.body.contains(r#"value="testuser""#));

        assert!(app.state.db.search_users(None).unwrap().is_empty());
        assert_eq!(app.get("/").await.status, StatusCode::FOUND);
    }

    #[tokio::test]
    async fn short_password_is_refused_before_hashing() {
        let mut app = TestApp::new();

        let resp = app
            .post_form("/signup", "username=testuser&email=test%40test.com&password=abc")
            .await;
        assert_eq!(resp.status, StatusCode::OK);
        assert!(resp.body.contains("Password must be at least 6 characters."));
        assert!(app.state.db.get_user_by_username("testuser").unwrap().is_none());
    }

    #[tokio::test]
    async fn login_with_good_credentials_greets_the_user() {
        let mut app = TestApp::new();
        app.signup("testuser", "HASHED_PASSWORD");

        let resp = app
            .post_form("/login", "username=testuser&password=HASHED_PASSWORD")
            .await;
        assert_eq!(resp.status, StatusCode::FOUND);
        assert_eq!(resp.location.as_deref(), Some("/"));

        let home = app.follow(resp).await;
        assert_eq!(home.status, StatusCode::OK);
        assert!(home.body.contains("Hello, testuser!"));
    }

    #[tokio::test]
    async fn bad_password_and_unknown_user_look_the_same() {
        let mut app = TestApp::new();
        app.signup("testuser", "HASHED_PASSWORD");

        let wrong = app.post_form("/login", "username=testuser&password=nope").await;
        let unknown = app.post_form("/login", "username=ghost&password=nope").await;

        for resp in [wrong, unknown] {
            assert_eq!(resp.status, StatusCode::OK);
            assert!(resp.body.contains("Invalid credentials."));
        }
        assert_eq!(app.get("/").await.status, StatusCode::FOUND);
    }

    #[tokio::test]
    async fn logout_drops_the_identity() {
        let mut app = TestApp::new();
        let user = app.signup("testuser", "HASHED_PASSWORD");
        app.login_as(user.id);

        let resp = app.get("/logout").await;
        assert_eq!(resp.location.as_deref(), Some("/login"));

        let login = app.follow(resp).await;
        assert!(login.body.contains("You have successfully logged out."));

        let guarded = app.get("/messages/new").await;
        assert_eq!(guarded.status, StatusCode::FOUND);
        assert_eq!(guarded.location.as_deref(), Some("/"));
    }
}
