//! Authorization Guard
//!
//! Runs the gates in a fixed order and stops at the first failure:
//! presence, authentication, freshness, roles, permissions. Every failure,
//! including provider faults, comes back as a decision; nothing is raised.

use std::sync::Arc;

use crate::application::config::AuthConfig;
use crate::application::resolve_session::SessionResolver;
use crate::domain::decision::{AccessReason, AuthorizationDecision, DenialReason, Principal};
use crate::domain::freshness::is_fresh;
use crate::domain::provider::{AccessResolver, IdentityProvider, LookupOptions};
use crate::domain::value_object::session_token::SessionToken;
use crate::error::AuthError;

/// Requirements for one protected action
///
/// Role and permission lists use OR semantics: holding any one entry of a
/// non-empty list passes that gate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardOptions {
    pub require_fresh: bool,
    pub required_roles: Vec<String>,
    pub required_permissions: Vec<String>,
    /// Overrides the configured fresh age
    pub freshness_threshold_secs: Option<i64>,
    /// Overrides the configured default redirect
    pub redirect_url: Option<String>,
}

impl GuardOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require_fresh(mut self) -> Self {
        self.require_fresh = true;
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_freshness_threshold(mut self, secs: i64) -> Self {
        self.freshness_threshold_secs = Some(secs);
        self
    }

    pub fn with_redirect(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = Some(url.into());
        self
    }

    /// Drop any permission requirement
    pub fn roles_only(mut self) -> Self {
        self.required_permissions.clear();
        self
    }

    /// Drop any role requirement
    pub fn permissions_only(mut self) -> Self {
        self.required_roles.clear();
        self
    }
}

pub struct AuthorizationGuard<P, R>
where
    P: IdentityProvider,
    R: AccessResolver,
{
    resolver: SessionResolver<P>,
    access: Arc<R>,
    config: Arc<AuthConfig>,
}

impl<P, R> AuthorizationGuard<P, R>
where
    P: IdentityProvider,
    R: AccessResolver,
{
    pub fn new(resolver: SessionResolver<P>, access: Arc<R>, config: Arc<AuthConfig>) -> Self {
        Self {
            resolver,
            access,
            config,
        }
    }

    pub async fn check(&self, token: Option<&str>, options: &GuardOptions) -> AuthorizationDecision {
        let redirect_url = options
            .redirect_url
            .clone()
            .or_else(|| self.config.default_redirect_url.clone());

        let decision = self.run_gates(token, options, redirect_url).await;

        match &decision {
            AuthorizationDecision::Granted { principal, fresh } => {
                tracing::debug!(user_id = %principal.user.id, ?fresh, "Access granted");
            }
            AuthorizationDecision::DeniedInsufficientAccess { reason, principal } => {
                tracing::debug!(
                    user_id = %principal.user.id,
                    reason = reason.code(),
                    "Access denied"
                );
            }
            AuthorizationDecision::Denied { reason, detail, .. } => {
                tracing::debug!(reason = reason.code(), ?detail, "Access denied");
            }
        }

        decision
    }

    async fn run_gates(
        &self,
        token: Option<&str>,
        options: &GuardOptions,
        redirect_url: Option<String>,
    ) -> AuthorizationDecision {
        // Presence
        let Ok(token) = SessionToken::from_option(token) else {
            return AuthorizationDecision::denied(DenialReason::MissingHeaders, redirect_url);
        };

        // Authentication
        let authenticated = match self
            .resolver
            .resolve_token(&token, LookupOptions::CACHED)
            .await
        {
            Ok(authenticated) => authenticated,
            Err(AuthError::MissingToken | AuthError::InvalidOrExpiredSession) => {
                return AuthorizationDecision::denied(DenialReason::Unauthenticated, redirect_url);
            }
            Err(e) => return check_error(e, redirect_url),
        };

        // Freshness
        if options.require_fresh {
            let threshold = options
                .freshness_threshold_secs
                .unwrap_or(self.config.fresh_age);
            let now = self.resolver.clock().now();
            if !is_fresh(&authenticated.session, threshold, now) {
                return AuthorizationDecision::denied(DenialReason::SessionNotFresh, redirect_url);
            }
        }

        let user_id = &authenticated.user.id;
        let roles = match self.access.roles_of(user_id).await {
            Ok(roles) => roles,
            Err(e) => return check_error(e, redirect_url),
        };
        let permissions = match self.access.permissions_of(user_id).await {
            Ok(permissions) => permissions,
            Err(e) => return check_error(e, redirect_url),
        };

        let principal = Principal::new(authenticated, roles, permissions);

        if !options.required_roles.is_empty() && !principal.has_any_role(&options.required_roles)
        {
            return AuthorizationDecision::DeniedInsufficientAccess {
                reason: AccessReason::InsufficientRoles,
                principal: Box::new(principal),
            };
        }

        if !options.required_permissions.is_empty()
            && !principal.has_any_permission(&options.required_permissions)
        {
            return AuthorizationDecision::DeniedInsufficientAccess {
                reason: AccessReason::InsufficientPermissions,
                principal: Box::new(principal),
            };
        }

        AuthorizationDecision::Granted {
            principal: Box::new(principal),
            fresh: options.require_fresh.then_some(true),
        }
    }
}

fn check_error(err: impl std::fmt::Display, redirect_url: Option<String>) -> AuthorizationDecision {
    tracing::warn!(error = %err, "Authorization check failed");
    AuthorizationDecision::Denied {
        reason: DenialReason::AuthCheckError,
        redirect_url,
        detail: Some(err.to_string()),
    }
}
