//! Session Resolver
//!
//! Turns a presented token into an [`AuthenticatedSession`] or a typed
//! failure. One provider lookup per call, no retries.

use std::sync::Arc;

use kernel::clock::Clock;

use crate::domain::entity::AuthenticatedSession;
use crate::domain::provider::{IdentityProvider, LookupOptions, ProviderError};
use crate::domain::value_object::session_token::SessionToken;
use crate::error::{AuthError, AuthResult};

pub struct SessionResolver<P>
where
    P: IdentityProvider,
{
    provider: Arc<P>,
    clock: Arc<dyn Clock>,
}

impl<P> Clone for SessionResolver<P>
where
    P: IdentityProvider,
{
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<P> SessionResolver<P>
where
    P: IdentityProvider,
{
    pub fn new(provider: Arc<P>, clock: Arc<dyn Clock>) -> Self {
        Self { provider, clock }
    }

    /// Resolve a raw, possibly absent token
    ///
    /// Fails with [`AuthError::MissingToken`] before touching the provider
    /// when the token is absent or blank.
    pub async fn resolve(
        &self,
        token: Option<&str>,
        options: LookupOptions,
    ) -> AuthResult<AuthenticatedSession> {
        let token = SessionToken::from_option(token)?;
        self.resolve_token(&token, options).await
    }

    pub async fn resolve_token(
        &self,
        token: &SessionToken,
        options: LookupOptions,
    ) -> AuthResult<AuthenticatedSession> {
        let found = self
            .provider
            .lookup_session(token, options)
            .await
            .map_err(classify_lookup_error)?;

        let Some(authenticated) = found else {
            tracing::debug!(
                token = %token.redacted(),
                bypass_cache = options.bypass_cache,
                "Session not found"
            );
            return Err(AuthError::InvalidOrExpiredSession);
        };

        // A cached provider answer can outlive the session itself
        if authenticated.session.is_expired(self.clock.now()) {
            tracing::debug!(
                token = %token.redacted(),
                expires_at = %authenticated.session.expires_at,
                "Session past expiry"
            );
            return Err(AuthError::InvalidOrExpiredSession);
        }

        Ok(authenticated)
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}

/// Map a lookup failure onto the session error kinds
pub(crate) fn classify_lookup_error(err: ProviderError) -> AuthError {
    if err.indicates_invalid_or_expired() {
        AuthError::InvalidOrExpiredSession
    } else {
        AuthError::Provider(err)
    }
}
