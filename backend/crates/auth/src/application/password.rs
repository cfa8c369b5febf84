//! Password Use Cases
//!
//! Reset request, reset completion and change of a known password.

use std::sync::Arc;

use platform::password::ClearTextPassword;

use crate::application::config::AuthConfig;
use crate::application::resolve_session::SessionResolver;
use crate::application::revoke_session::RevokeSessionUseCase;
use crate::application::sign_up::validated_password;
use crate::domain::provider::{IdentityProvider, LookupOptions};
use crate::domain::value_object::{email::Email, revocation_scope::RevocationScope};
use crate::error::{AuthError, AuthResult};

// ============================================================================
// Request reset
// ============================================================================

pub struct RequestPasswordResetUseCase<P>
where
    P: IdentityProvider,
{
    provider: Arc<P>,
}

impl<P> RequestPasswordResetUseCase<P>
where
    P: IdentityProvider,
{
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    /// Ask the provider to send a reset link
    ///
    /// An unknown address reports success like a known one, so the response
    /// reveals nothing about which accounts exist.
    pub async fn execute(&self, email: &str, redirect_to: Option<&str>) -> AuthResult<()> {
        let email = Email::new(email)?;
        let redirect_to = redirect_to.filter(|s| !s.trim().is_empty());

        match self.provider.request_password_reset(&email, redirect_to).await {
            Ok(()) => {
                tracing::info!(email_domain = email.domain(), "Password reset requested");
                Ok(())
            }
            Err(e) if e.indicates_not_found() => {
                tracing::debug!("Password reset requested for unknown account");
                Ok(())
            }
            Err(e) => Err(AuthError::Provider(e)),
        }
    }
}

// ============================================================================
// Complete reset
// ============================================================================

pub struct ResetPasswordUseCase<P>
where
    P: IdentityProvider,
{
    provider: Arc<P>,
    config: Arc<AuthConfig>,
}

impl<P> ResetPasswordUseCase<P>
where
    P: IdentityProvider,
{
    pub fn new(provider: Arc<P>, config: Arc<AuthConfig>) -> Self {
        Self { provider, config }
    }

    pub async fn execute(&self, reset_token: &str, new_password: &str) -> AuthResult<()> {
        let reset_token = reset_token.trim();
        if reset_token.is_empty() {
            return Err(AuthError::MissingResetToken);
        }
        if new_password.is_empty() {
            return Err(AuthError::MissingPassword);
        }
        let new_password = validated_password(new_password, self.config.min_password_length)?;

        self.provider
            .reset_password(reset_token, &new_password)
            .await
            .map_err(|e| {
                if e.indicates_invalid_or_expired() {
                    AuthError::InvalidResetToken
                } else {
                    AuthError::Provider(e)
                }
            })?;

        tracing::info!("Password reset completed");
        Ok(())
    }
}

// ============================================================================
// Change password
// ============================================================================

/// Change password input
#[derive(Debug, Default)]
pub struct ChangePasswordInput {
    pub current_password: String,
    pub new_password: String,
    /// Sign out every other session of the user afterwards
    pub revoke_other_sessions: bool,
}

pub struct ChangePasswordUseCase<P>
where
    P: IdentityProvider,
{
    resolver: SessionResolver<P>,
    config: Arc<AuthConfig>,
}

impl<P> ChangePasswordUseCase<P>
where
    P: IdentityProvider,
{
    pub fn new(resolver: SessionResolver<P>, config: Arc<AuthConfig>) -> Self {
        Self { resolver, config }
    }

    /// Change the password of the user owning `token`
    ///
    /// The user comes from the verified session, never from the request.
    pub async fn execute(&self, token: Option<&str>, input: ChangePasswordInput) -> AuthResult<()> {
        if input.current_password.is_empty() {
            return Err(AuthError::MissingCurrentPassword);
        }
        if input.new_password.is_empty() {
            return Err(AuthError::MissingNewPassword);
        }
        let new_password =
            validated_password(&input.new_password, self.config.min_password_length)?;
        let current_password = ClearTextPassword::new(&input.current_password)
            .map_err(|_| AuthError::IncorrectCurrentPassword)?;

        let acting = self.resolver.resolve(token, LookupOptions::CACHED).await?;

        self.resolver
            .provider()
            .change_credential(&acting.user.id, &current_password, &new_password)
            .await
            .map_err(|e| {
                if e.indicates_incorrect() {
                    AuthError::IncorrectCurrentPassword
                } else {
                    AuthError::Provider(e)
                }
            })?;

        tracing::info!(user_id = %acting.user.id, "Password changed");

        if input.revoke_other_sessions {
            RevokeSessionUseCase::new(self.resolver.clone())
                .execute(
                    Some(acting.session.token.as_str()),
                    RevocationScope::AllOtherForUser,
                )
                .await?;
        }

        Ok(())
    }
}
