//! Session helpers for axum handlers.

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use cookie_sessions_core::SessionHandle;
use cookie_sessions_store::{ManagerError, SessionManager};

use crate::cookies::{RequestCookies, ResponseCookies};

/// Resolve the session for a request's headers.
///
/// Returns the session plus any cookie that must go out with the response.
///
/// # Errors
/// Returns error if the manager fails to issue or load the session.
pub async fn start_session(
    manager: &SessionManager,
    headers: &HeaderMap,
) -> Result<(SessionHandle, ResponseCookies), SessionRejection> {
    let mut cookies = ResponseCookies::new();
    let session = manager
        .start(&RequestCookies(headers), &mut cookies)
        .await?;
    Ok((session, cookies))
}

/// Destroy the session named by a request's headers.
///
/// Returns the expiring cookie to send back (empty if there was no session).
///
/// # Errors
/// Returns error if the provider fails.
pub async fn destroy_session(
    manager: &SessionManager,
    headers: &HeaderMap,
) -> Result<ResponseCookies, SessionRejection> {
    let mut cookies = ResponseCookies::new();
    manager
        .destroy(&RequestCookies(headers), &mut cookies)
        .await?;
    Ok(cookies)
}

/// Session failure surfaced to an HTTP client as `500`.
#[derive(Debug)]
pub struct SessionRejection(pub ManagerError);

impl From<ManagerError> for SessionRejection {
    fn from(e: ManagerError) -> Self {
        Self(e)
    }
}

impl From<cookie_sessions_core::StorageError> for SessionRejection {
    fn from(e: cookie_sessions_core::StorageError) -> Self {
        Self(ManagerError::Storage(e))
    }
}

impl IntoResponse for SessionRejection {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "Session handling failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "session unavailable").into_response()
    }
}
