//! Sign In Use Case
//!
//! Validates credentials input and asks the provider for a session.

use std::sync::Arc;

use platform::client::ClientInfo;
use platform::password::ClearTextPassword;

use crate::domain::entity::AuthenticatedSession;
use crate::domain::provider::{IdentityProvider, SignInCredentials};
use crate::domain::value_object::email::Email;
use crate::error::{AuthError, AuthResult};

/// Sign in input
#[derive(Debug)]
pub struct SignInInput {
    pub email: String,
    pub password: String,
    /// Remember me flag
    pub remember_me: bool,
}

/// Sign in use case
pub struct SignInUseCase<P>
where
    P: IdentityProvider,
{
    provider: Arc<P>,
}

impl<P> SignInUseCase<P>
where
    P: IdentityProvider,
{
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    pub async fn execute(
        &self,
        input: SignInInput,
        client: ClientInfo,
    ) -> AuthResult<AuthenticatedSession> {
        if input.email.trim().is_empty() || input.password.is_empty() {
            return Err(AuthError::MissingLoginFields);
        }

        let email = Email::new(&input.email)?;
        // Whitespace-only passwords cannot match anything stored
        let password =
            ClearTextPassword::new(&input.password).map_err(|_| AuthError::InvalidCredentials)?;

        let credentials = SignInCredentials {
            email,
            password,
            remember_me: input.remember_me,
        };

        let authenticated = self
            .provider
            .create_session(credentials, client)
            .await
            .map_err(|e| {
                // "not verified" first: such messages may also say "invalid"
                if e.indicates_not_verified() {
                    AuthError::EmailNotVerified
                } else if e.indicates_invalid_or_expired() || e.indicates_not_found() {
                    AuthError::InvalidCredentials
                } else {
                    AuthError::Provider(e)
                }
            })?;

        tracing::info!(
            user_id = %authenticated.user.id,
            remember_me = input.remember_me,
            "User signed in"
        );

        Ok(authenticated)
    }
}
