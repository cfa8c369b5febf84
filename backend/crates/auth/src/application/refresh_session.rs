//! Refresh Policy
//!
//! Re-validates a session once it is older than the update-age window.
//! Rotation itself is the provider's business: an authoritative lookup may
//! hand back a new session, which is surfaced as-is.

use crate::application::resolve_session::SessionResolver;
use crate::domain::entity::AuthenticatedSession;
use crate::domain::freshness::within_update_age;
use crate::domain::provider::{IdentityProvider, LookupOptions};
use crate::error::{AuthError, AuthResult};

/// Result of a refresh attempt
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    /// Latest state of the session
    pub authenticated: AuthenticatedSession,
    /// Whether the authoritative re-check ran
    pub refreshed: bool,
    /// Whether the provider issued a different token
    pub rotated: bool,
}

pub struct RefreshSessionUseCase<P>
where
    P: IdentityProvider,
{
    resolver: SessionResolver<P>,
}

impl<P> RefreshSessionUseCase<P>
where
    P: IdentityProvider,
{
    pub fn new(resolver: SessionResolver<P>) -> Self {
        Self { resolver }
    }

    /// Refresh `token` if it is outside the update-age window, or if `force`
    ///
    /// Inside the window this is exactly one cached lookup.
    pub async fn execute(
        &self,
        token: Option<&str>,
        update_age_secs: i64,
        force: bool,
    ) -> AuthResult<RefreshOutcome> {
        let current = self.resolver.resolve(token, LookupOptions::CACHED).await?;

        let now = self.resolver.clock().now();
        if !force && within_update_age(&current.session, update_age_secs, now) {
            return Ok(RefreshOutcome {
                authenticated: current,
                refreshed: false,
                rotated: false,
            });
        }

        let latest = match self
            .resolver
            .resolve_token(&current.session.token, LookupOptions::AUTHORITATIVE)
            .await
        {
            Ok(latest) => latest,
            // Valid a moment ago, gone on the authoritative check
            Err(AuthError::InvalidOrExpiredSession) => {
                tracing::warn!(
                    user_id = %current.user.id,
                    token = %current.session.token.redacted(),
                    "Session vanished on authoritative re-check"
                );
                return Err(AuthError::RefreshFailed);
            }
            Err(e) => return Err(e),
        };

        let rotated = latest.session.token != current.session.token;
        if rotated {
            tracing::info!(user_id = %latest.user.id, "Session rotated");
        }

        Ok(RefreshOutcome {
            authenticated: latest,
            refreshed: true,
            rotated,
        })
    }
}
