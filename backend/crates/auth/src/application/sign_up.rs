//! Sign Up Use Case
//!
//! Validates registration input and hands it to the identity provider.

use std::sync::Arc;

use platform::client::ClientInfo;
use platform::password::ClearTextPassword;

use crate::application::config::AuthConfig;
use crate::domain::provider::{IdentityProvider, Registered, Registration};
use crate::domain::value_object::email::Email;
use crate::error::{AuthError, AuthResult};

/// Sign up input
#[derive(Debug, Default)]
pub struct SignUpInput {
    pub email: String,
    pub password: String,
    /// Display name
    pub name: String,
    /// Avatar URL
    pub image: Option<String>,
    /// Where the verification link should land
    pub callback_url: Option<String>,
}

/// Sign up use case
pub struct SignUpUseCase<P>
where
    P: IdentityProvider,
{
    provider: Arc<P>,
    config: Arc<AuthConfig>,
}

impl<P> SignUpUseCase<P>
where
    P: IdentityProvider,
{
    pub fn new(provider: Arc<P>, config: Arc<AuthConfig>) -> Self {
        Self { provider, config }
    }

    pub async fn execute(&self, input: SignUpInput, client: ClientInfo) -> AuthResult<Registered> {
        let name = input.name.trim();
        if input.email.trim().is_empty() || input.password.is_empty() || name.is_empty() {
            return Err(AuthError::MissingRegistrationFields);
        }

        let email = Email::new(&input.email)?;
        let password = validated_password(&input.password, self.config.min_password_length)?;

        let registration = Registration {
            email,
            password,
            name: name.to_string(),
            image: input.image.filter(|s| !s.trim().is_empty()),
            callback_url: input.callback_url.filter(|s| !s.trim().is_empty()),
        };

        let registered = self
            .provider
            .register(registration, client)
            .await
            .map_err(|e| {
                if e.indicates_already_exists() {
                    AuthError::UserExists
                } else {
                    AuthError::Provider(e)
                }
            })?;

        tracing::info!(
            user_id = %registered.user.id,
            signed_in = registered.session.is_some(),
            "User signed up"
        );

        Ok(registered)
    }
}

/// Normalize a new password and enforce the minimum length
pub(crate) fn validated_password(raw: &str, min_length: usize) -> AuthResult<ClearTextPassword> {
    let password = ClearTextPassword::new(raw).map_err(|_| AuthError::WeakPassword {
        min: min_length,
    })?;

    if password.char_count() < min_length {
        return Err(AuthError::WeakPassword { min: min_length });
    }

    Ok(password)
}
