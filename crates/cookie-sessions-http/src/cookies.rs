//! `Cookie` / `Set-Cookie` header adapters.

use std::convert::Infallible;

use axum::{
    http::{
        HeaderMap, HeaderValue,
        header::{COOKIE, SET_COOKIE},
    },
    response::{IntoResponse, IntoResponseParts, Response, ResponseParts},
};
use cookie_sessions_core::{CookieSink, CookieSource, SessionCookie, cookie::find_in_header};

/// Request cookies read from `Cookie` headers.
#[derive(Debug, Clone, Copy)]
pub struct RequestCookies<'a>(pub &'a HeaderMap);

impl CookieSource for RequestCookies<'_> {
    fn cookie(&self, name: &str) -> Option<String> {
        self.0
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|header| find_in_header(header, name))
    }
}

/// Cookies to send back as `Set-Cookie` headers.
///
/// Usable directly as response parts in an axum handler.
#[derive(Debug, Clone, Default)]
pub struct ResponseCookies {
    values: Vec<HeaderValue>,
}

impl ResponseCookies {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no cookie was set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Rendered `Set-Cookie` values.
    #[must_use]
    pub fn values(&self) -> &[HeaderValue] {
        &self.values
    }

    /// Append every cookie to `headers`.
    pub fn apply(&self, headers: &mut HeaderMap) {
        for value in &self.values {
            headers.append(SET_COOKIE, value.clone());
        }
    }

    /// Convert into a header map.
    #[must_use]
    pub fn into_headers(self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        self.apply(&mut headers);
        headers
    }
}

impl CookieSink for ResponseCookies {
    fn set_cookie(&mut self, cookie: SessionCookie) {
        match HeaderValue::from_str(&cookie.to_header_value()) {
            Ok(value) => self.values.push(value),
            Err(e) => {
                tracing::warn!(cookie = %cookie.name, error = %e, "Dropping unencodable cookie");
            }
        }
    }
}

impl IntoResponseParts for ResponseCookies {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        self.apply(res.headers_mut());
        Ok(res)
    }
}

/// An empty `200 OK` carrying the cookies.
impl IntoResponse for ResponseCookies {
    fn into_response(self) -> Response {
        (self, ()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cookie_sessions_core::SessionId;

    use super::*;

    #[test]
    fn test_reads_cookie_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(COOKIE, HeaderValue::from_static("lang=en; SID=abc%3D"));

        let cookies = RequestCookies(&headers);
        assert_eq!(cookies.cookie("SID").as_deref(), Some("abc%3D"));
        assert_eq!(cookies.cookie("theme").as_deref(), Some("dark"));
        assert_eq!(cookies.cookie("missing"), None);
    }

    #[test]
    fn test_no_cookie_header() {
        let headers = HeaderMap::new();
        assert_eq!(RequestCookies(&headers).cookie("SID"), None);
    }

    #[test]
    fn test_set_cookie_headers_are_appended() {
        let sid = SessionId::new("abc").unwrap();
        let mut cookies = ResponseCookies::new();
        assert!(cookies.is_empty());
        cookies.set_cookie(SessionCookie::issue("SID", &sid, Duration::from_secs(60)));
        cookies.set_cookie(SessionCookie::expire("OLD"));

        let mut headers = HeaderMap::new();
        headers.insert(SET_COOKIE, HeaderValue::from_static("other=1"));
        cookies.apply(&mut headers);

        let values: Vec<&str> = headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(values.len(), 3);
        assert_eq!(values[0], "other=1");
        assert_eq!(values[1], "SID=abc; Path=/; Max-Age=60; HttpOnly");
        assert!(values[2].starts_with("OLD=; Path=/; Expires="));
    }

    #[test]
    fn test_cookies_alone_are_a_response() {
        let mut cookies = ResponseCookies::new();
        cookies.set_cookie(SessionCookie::expire("SID"));

        let response = cookies.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let value = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(value.starts_with("SID=;"));
    }

    #[test]
    fn test_unencodable_cookie_is_dropped() {
        let mut cookies = ResponseCookies::new();
        let mut cookie = SessionCookie::expire("SID");
        cookie.value = "line\nbreak".to_string();
        cookies.set_cookie(cookie);
        assert!(cookies.is_empty());
    }
}
