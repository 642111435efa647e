//! Session identifiers.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use rand::{TryRngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of random bytes behind every generated identifier (256 bits).
pub const SESSION_ID_BYTES: usize = 32;

/// Identifier generation error.
#[derive(Debug, Error)]
pub enum IdError {
    #[error("Entropy source failed: {0}")]
    Entropy(String),
}

/// Opaque, unguessable token naming one client's server-side state.
///
/// Generated ids are base64url (padded) encodings of [`SESSION_ID_BYTES`]
/// bytes drawn from the operating system's CSPRNG. Ids replayed by clients
/// are accepted verbatim, so any non-empty string is a valid id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh identifier from the OS random source.
    ///
    /// # Errors
    /// Returns [`IdError::Entropy`] if the random source fails. An empty id is
    /// never produced as a fallback.
    pub fn generate() -> Result<Self, IdError> {
        Self::generate_with(&mut OsRng)
    }

    /// Generate an identifier from the given fallible random source.
    ///
    /// # Errors
    /// Returns [`IdError::Entropy`] if `rng` fails to fill the buffer.
    pub fn generate_with<R: TryRngCore + ?Sized>(rng: &mut R) -> Result<Self, IdError> {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        rng.try_fill_bytes(&mut bytes)
            .map_err(|e| IdError::Entropy(e.to_string()))?;
        Ok(Self(URL_SAFE.encode(bytes)))
    }

    /// Wrap an existing identifier string.
    ///
    /// Returns `None` for an empty string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.is_empty() { None } else { Some(Self(id)) }
    }

    /// Decode a cookie value back into an identifier.
    ///
    /// Empty or malformed values yield `None`, which callers treat as
    /// "no session".
    #[must_use]
    pub fn from_cookie_value(raw: &str) -> Option<Self> {
        let decoded = urlencoding::decode(raw.trim()).ok()?;
        Self::new(decoded.into_owned())
    }

    /// URL-escaped form suitable for a cookie value.
    #[must_use]
    pub fn to_cookie_value(&self) -> String {
        urlencoding::encode(&self.0).into_owned()
    }

    /// The raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Truncated form for log output.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
