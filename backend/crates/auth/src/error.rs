//! Auth Error Types
//!
//! This module provides auth-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.

use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

use crate::domain::provider::{ProviderError, ProviderErrorCode};

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Auth-specific error variants
///
/// Every variant has a stable wire code (see [`AuthError::code`]).
#[derive(Debug, Error)]
pub enum AuthError {
    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------
    /// No token was presented
    #[error("Session token is required")]
    MissingToken,

    /// Provider returned nothing for the token, or reported it invalid/expired
    #[error("Invalid or expired session token")]
    InvalidOrExpiredSession,

    /// The session was valid but the authoritative re-check returned nothing
    #[error("Could not refresh the session")]
    RefreshFailed,

    // ------------------------------------------------------------------
    // Guard denials (raised when a decision is rendered as an error)
    // ------------------------------------------------------------------
    #[error("Request headers are required for authentication")]
    MissingHeaders,

    #[error("User is not authenticated")]
    Unauthenticated,

    #[error("Session is not fresh enough")]
    SessionNotFresh,

    #[error("Insufficient role-based access")]
    InsufficientRoles,

    #[error("Insufficient permission-based access")]
    InsufficientPermissions,

    #[error("Authentication check failed: {0}")]
    AuthCheckError(String),

    // ------------------------------------------------------------------
    // Input validation
    // ------------------------------------------------------------------
    #[error("Email, password, and name are required fields")]
    MissingRegistrationFields,

    #[error("Email and password are required fields")]
    MissingLoginFields,

    #[error("Email address is required")]
    MissingEmail,

    #[error("Invalid email format")]
    InvalidEmailFormat,

    #[error("Password must be at least {min} characters long")]
    WeakPassword { min: usize },

    #[error("Password reset token is required")]
    MissingResetToken,

    #[error("Password is required")]
    MissingPassword,

    #[error("New password is required")]
    MissingNewPassword,

    #[error("Current password is required")]
    MissingCurrentPassword,

    // ------------------------------------------------------------------
    // Provider outcomes
    // ------------------------------------------------------------------
    #[error("A user with this email already exists")]
    UserExists,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Please verify your email address before logging in")]
    EmailNotVerified,

    #[error("The password reset token is invalid or has expired")]
    InvalidResetToken,

    #[error("The current password provided is incorrect")]
    IncorrectCurrentPassword,

    /// Unclassified provider failure, message passed through
    #[error("Identity provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Malformed request body
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingToken | AuthError::MissingResetToken => "MISSING_TOKEN",
            AuthError::InvalidOrExpiredSession => "INVALID_SESSION",
            AuthError::RefreshFailed => "REFRESH_FAILED",
            AuthError::MissingHeaders => "MISSING_HEADERS",
            AuthError::Unauthenticated => "UNAUTHENTICATED",
            AuthError::SessionNotFresh => "SESSION_NOT_FRESH",
            AuthError::InsufficientRoles => "INSUFFICIENT_ROLES",
            AuthError::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            AuthError::AuthCheckError(_) => "AUTH_CHECK_ERROR",
            AuthError::MissingRegistrationFields | AuthError::MissingLoginFields => {
                "MISSING_REQUIRED_FIELDS"
            }
            AuthError::MissingEmail => "MISSING_EMAIL",
            AuthError::MissingPassword => "MISSING_PASSWORD",
            AuthError::InvalidEmailFormat => "INVALID_EMAIL_FORMAT",
            AuthError::WeakPassword { .. } => "WEAK_PASSWORD",
            AuthError::MissingNewPassword => "MISSING_NEW_PASSWORD",
            AuthError::MissingCurrentPassword => "MISSING_CURRENT_PASSWORD",
            AuthError::UserExists => "USER_EXISTS",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            AuthError::InvalidResetToken => "INVALID_TOKEN",
            AuthError::IncorrectCurrentPassword => "INCORRECT_CURRENT_PASSWORD",
            AuthError::Provider(_) => "PROVIDER_ERROR",
            AuthError::InvalidRequest(_) => "INVALID_REQUEST",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::MissingToken
            | AuthError::InvalidOrExpiredSession
            | AuthError::RefreshFailed
            | AuthError::MissingHeaders
            | AuthError::Unauthenticated
            | AuthError::SessionNotFresh
            | AuthError::InvalidCredentials => ErrorKind::Unauthorized,
            AuthError::InsufficientRoles
            | AuthError::InsufficientPermissions
            | AuthError::EmailNotVerified => ErrorKind::Forbidden,
            AuthError::MissingRegistrationFields
            | AuthError::MissingLoginFields
            | AuthError::MissingEmail
            | AuthError::InvalidEmailFormat
            | AuthError::WeakPassword { .. }
            | AuthError::MissingResetToken
            | AuthError::MissingPassword
            | AuthError::MissingNewPassword
            | AuthError::MissingCurrentPassword
            | AuthError::InvalidResetToken
            | AuthError::InvalidRequest(_) => ErrorKind::BadRequest,
            AuthError::IncorrectCurrentPassword => ErrorKind::UnprocessableEntity,
            AuthError::UserExists => ErrorKind::Conflict,
            AuthError::Provider(e) if e.code == Some(ProviderErrorCode::Unavailable) => {
                ErrorKind::ServiceUnavailable
            }
            AuthError::Provider(_) => ErrorKind::BadGateway,
            AuthError::AuthCheckError(_) | AuthError::Internal(_) => {
                ErrorKind::InternalServerError
            }
        }
    }

    /// What the caller should do next, where there is a clear answer
    fn action(&self) -> Option<&'static str> {
        match self {
            AuthError::MissingToken | AuthError::MissingHeaders => {
                Some("Provide session credentials")
            }
            AuthError::InvalidOrExpiredSession
            | AuthError::RefreshFailed
            | AuthError::Unauthenticated => Some("Sign in again"),
            AuthError::SessionNotFresh => Some("Re-authenticate to continue"),
            _ => None,
        }
    }

    /// Convert to AppError
    pub fn to_app_error(&self) -> AppError {
        let err = AppError::new(self.kind(), self.to_string()).with_code(self.code());
        match self.action() {
            Some(action) => err.with_action(action),
            None => err,
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            AuthError::Provider(e) => {
                tracing::error!(error = %e, code = ?e.code, "Identity provider error");
            }
            AuthError::AuthCheckError(msg) => {
                tracing::error!(message = %msg, "Authorization check failed");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::RefreshFailed => {
                tracing::warn!("Authoritative session re-check returned nothing");
            }
            AuthError::InvalidCredentials => {
                tracing::warn!("Invalid login attempt");
            }
            _ => {
                tracing::debug!(error = %self, code = self.code(), "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        if err.is_server_error() {
            AuthError::Internal(err.message().to_string())
        } else {
            AuthError::InvalidRequest(err.message().to_string())
        }
    }
}
