//! Cookie-backed sessions.
//!
//! The whole session lives client-side in one cookie holding an HS256 token:
//! the authenticated user id (if any) and the flash notices waiting for the
//! next rendered page. A missing, tampered or expired cookie reads as an
//! anonymous session.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponseParts, ResponseParts},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::auth::AppState;

pub const SESSION_COOKIE: &str = "warbler_session";

/// Claim under which the authenticated user's id is stored.
pub const CURR_USER_KEY: &str = "curr_user";

/// Pending notices kept in the cookie; older ones are dropped first.
pub const MAX_PENDING_FLASHES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Danger,
}

impl FlashLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Danger => "danger",
        }
    }
}

/// One-shot notice shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    curr_user: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    flashes: Vec<Flash>,
    exp: usize,
}

/// Signing material and lifetime for session cookies.
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: chrono::Duration,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl: chrono::Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Sign a session value, as it would be stored in the cookie.
    pub fn encode(
        &self,
        user_id: Option<i64>,
        flashes: &[Flash],
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = SessionClaims {
            curr_user: user_id,
            flashes: flashes.to_vec(),
            exp: (chrono::Utc::now() + self.ttl).timestamp().max(0) as usize,
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    fn decode(&self, token: &str) -> Option<SessionClaims> {
        decode::<SessionClaims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| debug!("Discarding session cookie: {}", e))
            .ok()
    }
}

/// The per-request session: anonymous, or bound to one user id.
///
/// Mutations are written back as a `Set-Cookie` when the session is returned
/// as part of a response.
pub struct Session {
    user_id: Option<i64>,
    flashes: Vec<Flash>,
    keys: Arc<SessionKeys>,
    jar: CookieJar,
    dirty: bool,
}

impl Session {
    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    pub fn login(&mut self, user_id: i64) {
        self.user_id = Some(user_id);
        self.dirty = true;
    }

    pub fn logout(&mut self) {
        if self.user_id.take().is_some() {
            self.dirty = true;
        }
    }

    /// Queue a notice. A notice already pending is not queued twice.
    pub fn flash(&mut self, level: FlashLevel, text: impl Into<String>) {
        let flash = Flash {
            level,
            text: text.into(),
        };
        if self.flashes.contains(&flash) {
            return;
        }
        if self.flashes.len() >= MAX_PENDING_FLASHES {
            let excess = self.flashes.len() + 1 - MAX_PENDING_FLASHES;
            self.flashes.drain(..excess);
        }
        self.flashes.push(flash);
        self.dirty = true;
    }

    /// Drain pending notices for rendering.
    pub fn take_flashes(&mut self) -> Vec<Flash> {
        if !self.flashes.is_empty() {
            self.dirty = true;
        }
        std::mem::take(&mut self.flashes)
    }
}

impl FromRequestParts<AppState> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let claims = jar
            .get(SESSION_COOKIE)
            .and_then(|cookie| state.sessions.decode(cookie.value()));

        let (user_id, flashes) = match claims {
            Some(claims) => (claims.curr_user, claims.flashes),
            None => (None, Vec::new()),
        };

        Ok(Self {
            user_id,
            flashes,
            keys: state.sessions.clone(),
            jar,
            dirty: false,
        })
    }
}

impl IntoResponseParts for Session {
    type Error = Infallible;

    fn into_response_parts(self, res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if !self.dirty {
            return Ok(res);
        }

        let jar = match self.keys.encode(self.user_id, &self.flashes) {
            Ok(token) => self.jar.add(
                Cookie::build((SESSION_COOKIE, token))
                    .path("/")
                    .http_only(true)
                    .same_site(SameSite::Lax)
                    .build(),
            ),
            Err(e) => {
                error!("Failed to sign session cookie: {}", e);
                self.jar.remove(Cookie::build(SESSION_COOKIE).path("/").build())
            }
        };

        jar.into_response_parts(res)
    }
}
