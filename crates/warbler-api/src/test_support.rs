//! In-process client for driving the router in tests: carries the session
//! cookie between requests the way a browser would.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use axum_extra::extract::cookie::Cookie;
use tower::ServiceExt;

use warbler_db::{Database, User};

use crate::auth::{AppState, AppStateInner};
use crate::session::{SESSION_COOKIE, SessionKeys};

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    cookie: Option<String>,
}

impl TestApp {
    pub fn new() -> Self {
        let db = Database::open_in_memory().unwrap();
        let keys = SessionKeys::new("test-secret", chrono::Duration::hours(1));
        let state = AppStateInner::new(db, keys);
        Self {
            router: crate::router(state.clone()),
            state,
            cookie: None,
        }
    }

    pub fn signup(&self, username: &str, password: &str) -> User {
        self.state
            .db
            .signup(username, &format!("{username}@test.com"), password, None)
            .unwrap()
    }

    /// Bind the client's session to `user_id` without going through /login.
    pub fn login_as(&mut self, user_id: i64) {
        let token = self.state.sessions.encode(Some(user_id), &[]).unwrap();
        self.cookie = Some(format!("{SESSION_COOKIE}={token}"));
    }

    pub fn tamper_cookie(&mut self) {
        if let Some(cookie) = self.cookie.as_mut() {
            cookie.push('x');
        }
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        let req = self.request("GET", uri).body(Body::empty()).unwrap();
        self.send(req).await
    }

    pub async fn post_form(&mut self, uri: &str, body: &str) -> TestResponse {
        let req = self
            .request("POST", uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    /// Follow one redirect with a GET.
    pub async fn follow(&mut self, resp: TestResponse) -> TestResponse {
        let location = resp.location.expect("response is not a redirect");
        self.get(&location).await
    }

    pub async fn follow_all(&mut self, mut resp: TestResponse) -> TestResponse {
        for _ in 0..10 {
            if resp.location.is_none() {
                return resp;
            }
            resp = self.follow(resp).await;
        }
        panic!("redirect loop");
    }

    fn request(&self, method: &str, uri: &str) -> axum::http::request::Builder {
        let builder = Request::builder().method(method).uri(uri);
        match &self.cookie {
            Some(cookie) => builder.header(header::COOKIE, cookie),
            None => builder,
        }
    }

    async fn send(&mut self, req: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(req).await.unwrap();

        for value in response.headers().get_all(header::SET_COOKIE) {
            let cookie = Cookie::parse(value.to_str().unwrap().to_string()).unwrap();
            if cookie.name() == SESSION_COOKIE {
                self.cookie = Some(format!("{}={}", cookie.name(), cookie.value()));
            }
        }

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        TestResponse {
            status,
            location,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }
}
