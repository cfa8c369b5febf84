//! API DTOs (Data Transfer Objects)
//!
//! Timestamps become RFC 3339 strings here and nowhere else.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::decision::Principal;
use crate::domain::entity::{Session, User};
use crate::domain::value_object::revocation_scope::RevocationScope;

fn iso(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Shared shapes
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub email_verified: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.to_string(),
            name: user.name.clone(),
            image: user.image.clone(),
            email_verified: user.email_verified,
            created_at: iso(&user.created_at),
            updated_at: iso(&user.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDto {
    pub token: String,
    pub user_id: String,
    pub created_at: String,
    pub expires_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl From<&Session> for SessionDto {
    fn from(session: &Session) -> Self {
        Self {
            token: session.token.as_str().to_string(),
            user_id: session.user_id.to_string(),
            created_at: iso(&session.created_at),
            expires_at: iso(&session.expires_at),
            ip_address: session.ip_address.clone(),
            user_agent: session.user_agent.clone(),
        }
    }
}

/// Plain acknowledgement
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

// ============================================================================
// Sign Up / Sign In
// ============================================================================

/// Sign up request
///
/// Missing fields deserialize as empty so validation reports them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub image: Option<String>,
    #[serde(alias = "callbackURL")]
    pub callback_url: Option<String>,
}

/// Sign in request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_true")]
    pub remember_me: bool,
}

/// Sign up / sign in response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserDto,
    /// Absent when sign-in waits for email verification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionDto>,
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionQuery {
    pub disable_cookie_cache: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: UserDto,
    pub session: SessionDto,
    /// Against the configured fresh age
    pub fresh: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RefreshRequest {
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub user: UserDto,
    pub session: SessionDto,
    pub refreshed: bool,
    pub rotated: bool,
}

// ============================================================================
// Sign Out
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignOutRequest {
    pub scope: RevocationScope,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignOutResponse {
    pub success: bool,
    pub scope: RevocationScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions_revoked: Option<u64>,
}

// ============================================================================
// Passwords
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForgotPasswordRequest {
    pub email: String,
    pub redirect_to: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub revoke_other_sessions: bool,
}

// ============================================================================
// Me
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user: UserDto,
    pub session: SessionDto,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fresh: Option<bool>,
}

impl MeResponse {
    pub fn new(principal: &Principal, fresh: Option<bool>) -> Self {
        Self {
            user: UserDto::from(&principal.user),
            session: SessionDto::from(&principal.session),
            roles: principal.roles.iter().cloned().collect(),
            permissions: principal.permissions.iter().cloned().collect(),
            fresh,
        }
    }
}
