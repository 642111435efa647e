//! Session cookie contract.
//!
//! The manager never touches HTTP types directly: it reads request cookies
//! through [`CookieSource`] and hands response cookies to a [`CookieSink`].

use std::{
    collections::HashMap,
    fmt::Write as _,
    time::{Duration, SystemTime},
};

use crate::SessionId;

/// A cookie the manager wants set on the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub http_only: bool,
    /// Seconds until expiry. Negative means "delete now".
    pub max_age: Option<i64>,
    pub expires: Option<SystemTime>,
}

impl SessionCookie {
    /// Cookie binding `sid` to the client for `max_lifetime`.
    #[must_use]
    pub fn issue(name: &str, sid: &SessionId, max_lifetime: Duration) -> Self {
        Self {
            name: name.to_string(),
            value: sid.to_cookie_value(),
            path: "/".to_string(),
            http_only: true,
            max_age: Some(i64::try_from(max_lifetime.as_secs()).unwrap_or(i64::MAX)),
            expires: None,
        }
    }

    /// Cookie instructing the client to drop `name` immediately.
    #[must_use]
    pub fn expire(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: String::new(),
            path: "/".to_string(),
            http_only: true,
            max_age: Some(-1),
            expires: Some(SystemTime::now()),
        }
    }

    /// Whether this cookie removes the client's copy.
    #[must_use]
    pub fn is_removal(&self) -> bool {
        self.max_age.is_some_and(|age| age < 0)
    }

    /// Render as a `Set-Cookie` header value.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        let mut out = format!("{}={}", self.name, self.value);
        if !self.path.is_empty() {
            let _ = write!(out, "; Path={}", self.path);
        }
        if let Some(expires) = self.expires {
            let _ = write!(out, "; Expires={}", httpdate::fmt_http_date(expires));
        }
        match self.max_age {
            Some(age) if age > 0 => {
                let _ = write!(out, "; Max-Age={age}");
            }
            Some(age) if age < 0 => out.push_str("; Max-Age=0"),
            _ => {}
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        out
    }
}

/// Read access to the cookies a client sent.
pub trait CookieSource {
    /// Raw value of the cookie called `name`, if present.
    fn cookie(&self, name: &str) -> Option<String>;
}

/// Receiver for cookies to set on the response.
pub trait CookieSink {
    /// Queue `cookie` for the response.
    fn set_cookie(&mut self, cookie: SessionCookie);
}

impl CookieSource for HashMap<String, String> {
    fn cookie(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl<S: CookieSource + ?Sized> CookieSource for &S {
    fn cookie(&self, name: &str) -> Option<String> {
        (**self).cookie(name)
    }
}

impl CookieSink for Vec<SessionCookie> {
    fn set_cookie(&mut self, cookie: SessionCookie) {
        self.push(cookie);
    }
}

/// Find `name` in a `Cookie` request header (`a=1; b=2`).
#[must_use]
pub fn find_in_header(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key.trim() == name).then(|| value.trim().trim_matches('"').to_string())
    })
}
