//! Revocation Coordinator
//!
//! Executes a sign-out at one of three scopes. Broad scopes derive the user
//! from the verified session, so a caller can never name someone else's
//! sessions. Revocation is a desired-state operation: revoking a session
//! that is already gone succeeds.

use std::sync::Arc;

use crate::application::resolve_session::SessionResolver;
use crate::domain::provider::{IdentityProvider, LookupOptions, ProviderError};
use crate::domain::value_object::{
    revocation_scope::RevocationScope, session_token::SessionToken, user_id::UserId,
};
use crate::error::{AuthError, AuthResult};

/// What a revocation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationOutcome {
    pub scope: RevocationScope,
    /// Owner of the acting session; resolved for broad scopes only
    pub user_id: Option<UserId>,
    /// Sessions removed, when the provider reports a count
    pub sessions_revoked: Option<u64>,
}

pub struct RevokeSessionUseCase<P>
where
    P: IdentityProvider,
{
    provider: Arc<P>,
    resolver: SessionResolver<P>,
}

impl<P> RevokeSessionUseCase<P>
where
    P: IdentityProvider,
{
    pub fn new(resolver: SessionResolver<P>) -> Self {
        Self {
            provider: resolver.provider().clone(),
            resolver,
        }
    }

    pub async fn execute(
        &self,
        token: Option<&str>,
        scope: RevocationScope,
    ) -> AuthResult<RevocationOutcome> {
        let token = SessionToken::from_option(token)?;

        match scope {
            RevocationScope::Current => self.revoke_current(&token).await,
            RevocationScope::AllForUser | RevocationScope::AllOtherForUser => {
                self.revoke_broad(&token, scope).await
            }
        }
    }

    async fn revoke_current(&self, token: &SessionToken) -> AuthResult<RevocationOutcome> {
        match self.provider.revoke_session(token).await {
            Ok(()) => {
                tracing::info!(token = %token.redacted(), "Session revoked");
            }
            Err(e) if e.indicates_invalid_or_expired() => {
                tracing::debug!(
                    token = %token.redacted(),
                    error = %e,
                    "Session already gone, nothing to revoke"
                );
            }
            Err(e) => return Err(AuthError::Provider(e)),
        }

        Ok(RevocationOutcome {
            scope: RevocationScope::Current,
            user_id: None,
            sessions_revoked: None,
        })
    }

    async fn revoke_broad(
        &self,
        token: &SessionToken,
        scope: RevocationScope,
    ) -> AuthResult<RevocationOutcome> {
        // No broad revoke without a verified acting session
        let acting = self
            .resolver
            .resolve_token(token, LookupOptions::CACHED)
            .await?;
        let user_id = acting.user.id;

        let result = match scope {
            RevocationScope::AllOtherForUser => {
                self.provider
                    .revoke_other_sessions(&acting.session.token, &user_id)
                    .await
            }
            _ => self.provider.revoke_all_sessions(&user_id).await,
        };

        let sessions_revoked = absorb_already_revoked(result)?;

        tracing::info!(
            user_id = %user_id,
            scope = %scope,
            sessions_revoked,
            "Sessions revoked"
        );

        Ok(RevocationOutcome {
            scope,
            user_id: Some(user_id),
            sessions_revoked: Some(sessions_revoked),
        })
    }
}

/// Treat "already invalid" as zero sessions revoked
fn absorb_already_revoked(result: Result<u64, ProviderError>) -> AuthResult<u64> {
    match result {
        Ok(count) => Ok(count),
        Err(e) if e.indicates_invalid_or_expired() => Ok(0),
        Err(e) => Err(AuthError::Provider(e)),
    }
}
