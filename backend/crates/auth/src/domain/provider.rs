//! Provider Ports
//!
//! Interfaces to the external systems this crate layers over. The identity
//! provider owns users, credentials and session storage; the access resolver
//! supplies roles and permissions. Implementations live in `infra`.

use std::collections::BTreeSet;

use derive_more::Display;
use platform::client::ClientInfo;
use platform::password::ClearTextPassword;
use thiserror::Error;

use crate::domain::entity::{AuthenticatedSession, Session, User};
use crate::domain::value_object::{email::Email, session_token::SessionToken, user_id::UserId};

// ============================================================================
// Provider errors
// ============================================================================

/// Machine-readable failure code, when the provider offers one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ProviderErrorCode {
    InvalidSession,
    ExpiredSession,
    InvalidCredentials,
    EmailNotVerified,
    UserNotFound,
    UserAlreadyExists,
    InvalidToken,
    IncorrectPassword,
    Unavailable,
}

/// Failure reported by the identity provider
///
/// Classification prefers `code`. Providers that only report text are
/// classified by case-insensitive substring inspection of `message`, which
/// is best effort: a message that mentions neither keyword falls through to
/// the generic provider error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub code: Option<ProviderErrorCode>,
    pub message: String,
}

impl ProviderError {
    /// Message-only error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Error with a structured code
    pub fn coded(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    /// Structured code, or the code inferred from the message
    pub fn classify(&self) -> Option<ProviderErrorCode> {
        if self.code.is_some() {
            return self.code;
        }

        let message = self.message.to_lowercase();
        [
            ("not verified", ProviderErrorCode::EmailNotVerified),
            ("already exists", ProviderErrorCode::UserAlreadyExists),
            ("not found", ProviderErrorCode::UserNotFound),
            ("expired", ProviderErrorCode::ExpiredSession),
            ("incorrect", ProviderErrorCode::IncorrectPassword),
            ("invalid", ProviderErrorCode::InvalidSession),
        ]
        .into_iter()
        .find_map(|(needle, code)| message.contains(needle).then_some(code))
    }

    /// The presented session, credential or token is invalid or expired
    pub fn indicates_invalid_or_expired(&self) -> bool {
        self.matches(
            &[
                ProviderErrorCode::InvalidSession,
                ProviderErrorCode::ExpiredSession,
                ProviderErrorCode::InvalidCredentials,
                ProviderErrorCode::InvalidToken,
            ],
            &["invalid", "expired"],
        )
    }

    pub fn indicates_not_verified(&self) -> bool {
        self.matches(&[ProviderErrorCode::EmailNotVerified], &["not verified"])
    }

    pub fn indicates_not_found(&self) -> bool {
        self.matches(&[ProviderErrorCode::UserNotFound], &["not found"])
    }

    pub fn indicates_already_exists(&self) -> bool {
        self.matches(&[ProviderErrorCode::UserAlreadyExists], &["already exists"])
    }

    /// A supplied secret did not match
    pub fn indicates_incorrect(&self) -> bool {
        self.matches(
            &[
                ProviderErrorCode::IncorrectPassword,
                ProviderErrorCode::InvalidCredentials,
            ],
            &["incorrect", "invalid"],
        )
    }

    fn matches(&self, codes: &[ProviderErrorCode], needles: &[&str]) -> bool {
        match self.code {
            Some(code) => codes.contains(&code),
            None => {
                let message = self.message.to_lowercase();
                needles.iter().any(|needle| message.contains(needle))
            }
        }
    }
}

// ============================================================================
// Request / response shapes
// ============================================================================

/// Options for a session lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LookupOptions {
    /// Skip any provider-side cache and check the session store directly
    pub bypass_cache: bool,
}

impl LookupOptions {
    pub const CACHED: Self = Self {
        bypass_cache: false,
    };

    pub const AUTHORITATIVE: Self = Self { bypass_cache: true };
}

#[derive(Debug)]
pub struct SignInCredentials {
    pub email: Email,
    pub password: ClearTextPassword,
    /// Longer-lived session when set
    pub remember_me: bool,
}

#[derive(Debug)]
pub struct Registration {
    pub email: Email,
    pub password: ClearTextPassword,
    pub name: String,
    pub image: Option<String>,
    /// Where the verification link should land
    pub callback_url: Option<String>,
}

/// Result of a registration
///
/// `session` is `None` when the provider withholds sign-in until the email
/// address is verified.
#[derive(Debug, Clone)]
pub struct Registered {
    pub user: User,
    pub session: Option<Session>,
}

// ============================================================================
// Ports
// ============================================================================

/// Identity provider port
#[trait_variant::make(IdentityProvider: Send)]
pub trait LocalIdentityProvider {
    /// Verify credentials and issue a session
    async fn create_session(
        &self,
        credentials: SignInCredentials,
        client: ClientInfo,
    ) -> Result<AuthenticatedSession, ProviderError>;

    /// Create a user, issuing a session when sign-in is allowed immediately
    async fn register(
        &self,
        registration: Registration,
        client: ClientInfo,
    ) -> Result<Registered, ProviderError>;

    /// Look up a session by token
    ///
    /// `Ok(None)` means the token is unknown, revoked or expired.
    async fn lookup_session(
        &self,
        token: &SessionToken,
        options: LookupOptions,
    ) -> Result<Option<AuthenticatedSession>, ProviderError>;

    /// Revoke one session; unknown tokens are not an error
    async fn revoke_session(&self, token: &SessionToken) -> Result<(), ProviderError>;

    /// Revoke every session of a user, returning how many were removed
    async fn revoke_all_sessions(&self, user_id: &UserId) -> Result<u64, ProviderError>;

    /// Revoke every session of a user except `keep`
    async fn revoke_other_sessions(
        &self,
        keep: &SessionToken,
        user_id: &UserId,
    ) -> Result<u64, ProviderError>;

    /// Replace a user's password after checking the current one
    async fn change_credential(
        &self,
        user_id: &UserId,
        current: &ClearTextPassword,
        new: &ClearTextPassword,
    ) -> Result<(), ProviderError>;

    /// Start a password reset (deliver a reset link out of band)
    async fn request_password_reset(
        &self,
        email: &Email,
        redirect_to: Option<&str>,
    ) -> Result<(), ProviderError>;

    /// Complete a password reset with a previously issued reset token
    async fn reset_password(
        &self,
        reset_token: &str,
        new: &ClearTextPassword,
    ) -> Result<(), ProviderError>;
}

/// Role / permission lookup port
#[trait_variant::make(AccessResolver: Send)]
pub trait LocalAccessResolver {
    async fn roles_of(&self, user_id: &UserId) -> Result<BTreeSet<String>, ProviderError>;

    async fn permissions_of(&self, user_id: &UserId) -> Result<BTreeSet<String>, ProviderError>;
}

/// Resolver used when none is configured: nobody holds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAccessResolver;

impl AccessResolver for NoAccessResolver {
    async fn roles_of(&self, _user_id: &UserId) -> Result<BTreeSet<String>, ProviderError> {
        Ok(BTreeSet::new())
    }

    async fn permissions_of(&self, _user_id: &UserId) -> Result<BTreeSet<String>, ProviderError> {
        Ok(BTreeSet::new())
    }
}
