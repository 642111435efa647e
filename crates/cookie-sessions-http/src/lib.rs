//! HTTP adapters for cookie-bound sessions.
//!
//! Provides:
//! - `RequestCookies` / `ResponseCookies` - `Cookie` and `Set-Cookie` header glue
//! - `start_session` / `destroy_session` - axum handler helpers

pub mod cookies;
pub mod session;

pub use cookies::{RequestCookies, ResponseCookies};
pub use session::{SessionRejection, destroy_session, start_session};
