//! Session identity carried in a cookie.
//!
//! The cookie only holds a random session id; credentials stay server-side.

use crate::config::SessionConfig;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct SessionCookie {
    pub name: String,
    pub max_age: time::Duration,
    pub secure: bool,
}

impl SessionCookie {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            name: config.cookie_name.clone(),
            max_age: time::Duration::minutes(config.ttl_minutes),
            secure: config.secure_cookie,
        }
    }

    /// Session id from the request, if the browser sent one.
    pub fn session_id(&self, jar: &CookieJar) -> Option<String> {
        jar.get(&self.name)
            .map(|cookie| cookie.value().to_string())
            .filter(|id| !id.is_empty())
    }

    /// Returns the existing session id or issues a new one, refreshing the
    /// cookie either way.
    pub fn ensure(&self, jar: CookieJar) -> (CookieJar, String) {
        let session_id = self
            .session_id(&jar)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let cookie = Cookie::build((self.name.clone(), session_id.clone()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(self.max_age)
            .build();

        (jar.add(cookie), session_id)
    }

    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        jar.remove(Cookie::build((self.name.clone(), "")).path("/"))
    }
}
