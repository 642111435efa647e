//! Core abstractions for cookie-bound server-side sessions.
//!
//! This crate provides the fundamental building blocks:
//! - `SessionId` - Unguessable session identifiers
//! - `Session` / `SessionStorage` - Bag and backend traits
//! - `SessionCookie` - Cookie issuance and expiry contract
//! - `ProviderRegistry` - Named storage backends

pub mod cookie;
pub mod id;
pub mod registry;
pub mod traits;

pub use cookie::{CookieSink, CookieSource, SessionCookie};
pub use id::{IdError, SessionId};
pub use registry::{ProviderRegistry, RegistryError};
pub use traits::{Session, SessionExt, SessionHandle, SessionStorage, StorageError};
