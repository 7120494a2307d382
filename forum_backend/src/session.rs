//! Signed, expiring session tokens carried in the `forum_session` cookie.
//!
//! A token reads `{user_id}.{expires_unix}.{mac}` where `mac` is the
//! base64url BLAKE3 keyed hash of the first two fields. Nothing is stored
//! server side; logging out only clears the cookie.

use crate::accounts::AccountService;
use crate::config::SessionConfig;
use crate::database::models::UserRecord;
use crate::error::{ServiceError, ServiceResult};
use crate::utils::now_unix;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use cookie::time::Duration;
use cookie::{Cookie, SameSite};

pub const SESSION_COOKIE: &str = "forum_session";

#[derive(Clone)]
pub struct SessionKeys {
    key: [u8; 32],
    ttl_secs: i64,
    secure: bool,
}

impl SessionKeys {
    pub fn new(key: [u8; 32], ttl_secs: i64, secure: bool) -> Self {
        Self {
            key,
            ttl_secs,
            secure,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        let key = match config.secret {
            Some(key) => key,
            None => {
                tracing::warn!(
                    "FORUM_SESSION_SECRET not set; using a random key, sessions end on restart"
                );
                rand::random()
            }
        };
        Self::new(key, config.ttl_secs, config.secure_cookies)
    }

    pub fn issue(&self, user_id: i64) -> String {
        self.issue_at(user_id, now_unix())
    }

    pub fn issue_at(&self, user_id: i64, now: i64) -> String {
        let payload = format!("{user_id}.{}", now.saturating_add(self.ttl_secs));
        let mac = blake3::keyed_hash(&self.key, payload.as_bytes());
        format!("{payload}.{}", URL_SAFE_NO_PAD.encode(mac.as_bytes()))
    }

    /// Returns the user id of a well-formed, authentic, unexpired token.
    pub fn verify(&self, token: &str) -> Option<i64> {
        self.verify_at(token, now_unix())
    }

    pub fn verify_at(&self, token: &str, now: i64) -> Option<i64> {
        let (payload, mac) = token.rsplit_once('.')?;
        let (user_id, expires) = payload.split_once('.')?;
        let user_id: i64 = user_id.parse().ok()?;
        let expires: i64 = expires.parse().ok()?;

        let decoded = URL_SAFE_NO_PAD.decode(mac).ok()?;
        let provided: [u8; 32] = decoded.try_into().ok()?;
        let expected = blake3::keyed_hash(&self.key, payload.as_bytes());
        // blake3::Hash equality is constant time.
        if expected != blake3::Hash::from(provided) {
            return None;
        }
        if expires <= now {
            return None;
        }
        Some(user_id)
    }

    /// Maps a raw token to its user. Any failure is `Unauthorized`.
    pub fn resolve_user(
        &self,
        accounts: &AccountService,
        token: Option<&str>,
    ) -> ServiceResult<UserRecord> {
        let user_id = token
            .and_then(|token| self.verify(token))
            .ok_or(ServiceError::Unauthorized)?;
        accounts.find(user_id)?.ok_or(ServiceError::Unauthorized)
    }

    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .http_only(true)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(Duration::seconds(self.ttl_secs))
            .secure(self.secure)
            .build()
    }

    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build((SESSION_COOKIE, ""))
            .http_only(true)
            .same_site(SameSite::Lax)
            .path("/")
            .secure(self.secure)
            .build();
        cookie.make_removal();
        cookie
    }
}

/// Finds the session token in a raw `Cookie` request header.
pub fn token_from_cookie_header(header: &str) -> Option<String> {
    Cookie::split_parse(header)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}
