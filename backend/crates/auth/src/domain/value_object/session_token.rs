//! Session Token Value Object
//!
//! Opaque, provider-issued credential. This crate never interprets the
//! contents; it only guarantees the value is non-empty.

use std::fmt;

use crate::error::{AuthError, AuthResult};

/// Number of leading characters kept by [`SessionToken::redacted`]
const REDACTED_PREFIX_LEN: usize = 6;

/// Entropy of minted tokens, in bytes
const GENERATED_TOKEN_BYTES: usize = 32;

/// Non-empty opaque session token
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Parse a presented token
    ///
    /// Surrounding whitespace is ignored. Empty input fails with
    /// [`AuthError::MissingToken`], which callers must keep distinct from an
    /// invalid token.
    pub fn parse(raw: &str) -> AuthResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AuthError::MissingToken);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Mint a fresh random token (for providers that issue their own)
    pub fn generate() -> Self {
        Self(platform::crypto::random_token(GENERATED_TOKEN_BYTES))
    }

    /// Parse an optional token; `None` is treated like an empty string
    pub fn from_option(raw: Option<&str>) -> AuthResult<Self> {
        Self::parse(raw.unwrap_or_default())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Short prefix for logs
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(REDACTED_PREFIX_LEN).collect();
        format!("{prefix}…")
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionToken").field(&self.redacted()).finish()
    }
}

impl AsRef<str> for SessionToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
