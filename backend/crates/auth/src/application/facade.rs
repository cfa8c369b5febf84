//! Auth Facade
//!
//! Service object holding the provider, the access resolver, configuration
//! and the clock. Built once at startup and shared by reference; every
//! operation builds its use case on the fly.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kernel::clock::{Clock, SystemClock};
use platform::client::ClientInfo;

use crate::application::authorize::{AuthorizationGuard, GuardOptions};
use crate::application::config::AuthConfig;
use crate::application::password::{
    ChangePasswordInput, ChangePasswordUseCase, RequestPasswordResetUseCase, ResetPasswordUseCase,
};
use crate::application::refresh_session::{RefreshOutcome, RefreshSessionUseCase};
use crate::application::resolve_session::SessionResolver;
use crate::application::revoke_session::{RevocationOutcome, RevokeSessionUseCase};
use crate::application::sign_in::{SignInInput, SignInUseCase};
use crate::application::sign_up::{SignUpInput, SignUpUseCase};
use crate::domain::decision::AuthorizationDecision;
use crate::domain::entity::{AuthenticatedSession, Session};
use crate::domain::freshness;
use crate::domain::provider::{
    AccessResolver, IdentityProvider, LookupOptions, NoAccessResolver, Registered,
};
use crate::domain::value_object::revocation_scope::RevocationScope;
use crate::error::AuthResult;

pub struct AuthFacade<P, R = NoAccessResolver>
where
    P: IdentityProvider,
    R: AccessResolver,
{
    provider: Arc<P>,
    access: Arc<R>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<P, R> Clone for AuthFacade<P, R>
where
    P: IdentityProvider,
    R: AccessResolver,
{
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            access: self.access.clone(),
            config: self.config.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<P> AuthFacade<P, NoAccessResolver>
where
    P: IdentityProvider,
{
    /// Facade without roles or permissions, on the wall clock
    pub fn new(provider: P, config: AuthConfig) -> Self {
        Self::from_parts(
            Arc::new(provider),
            Arc::new(NoAccessResolver),
            Arc::new(config),
            Arc::new(SystemClock),
        )
    }
}

impl<P, R> AuthFacade<P, R>
where
    P: IdentityProvider,
    R: AccessResolver,
{
    pub fn from_parts(
        provider: Arc<P>,
        access: Arc<R>,
        config: Arc<AuthConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            access,
            config,
            clock,
        }
    }

    /// Swap in a role/permission source
    pub fn with_access_resolver<R2>(self, access: R2) -> AuthFacade<P, R2>
    where
        R2: AccessResolver,
    {
        AuthFacade::from_parts(self.provider, Arc::new(access), self.config, self.clock)
    }

    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn resolver(&self) -> SessionResolver<P> {
        SessionResolver::new(self.provider.clone(), self.clock.clone())
    }

    // ========================================================================
    // Credentials
    // ========================================================================

    pub async fn register(&self, input: SignUpInput, client: ClientInfo) -> AuthResult<Registered> {
        SignUpUseCase::new(self.provider.clone(), self.config.clone())
            .execute(input, client)
            .await
    }

    pub async fn login(
        &self,
        input: SignInInput,
        client: ClientInfo,
    ) -> AuthResult<AuthenticatedSession> {
        SignInUseCase::new(self.provider.clone())
            .execute(input, client)
            .await
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    /// Resolve a token; `disable_cookie_cache` forces an authoritative lookup
    pub async fn validate(
        &self,
        token: Option<&str>,
        disable_cookie_cache: bool,
    ) -> AuthResult<AuthenticatedSession> {
        let options = LookupOptions {
            bypass_cache: disable_cookie_cache,
        };
        self.resolver().resolve(token, options).await
    }

    /// Freshness of `session` against `threshold_secs`, or the configured
    /// fresh age
    pub fn is_fresh(&self, session: &Session, threshold_secs: Option<i64>) -> bool {
        let threshold = threshold_secs.unwrap_or(self.config.fresh_age);
        freshness::is_fresh(session, threshold, self.clock.now())
    }

    /// Refresh against the configured update age
    pub async fn refresh(&self, token: Option<&str>, force: bool) -> AuthResult<RefreshOutcome> {
        self.refresh_with(token, self.config.update_age, force).await
    }

    pub async fn refresh_with(
        &self,
        token: Option<&str>,
        update_age_secs: i64,
        force: bool,
    ) -> AuthResult<RefreshOutcome> {
        RefreshSessionUseCase::new(self.resolver())
            .execute(token, update_age_secs, force)
            .await
    }

    pub async fn logout(
        &self,
        token: Option<&str>,
        scope: RevocationScope,
    ) -> AuthResult<RevocationOutcome> {
        RevokeSessionUseCase::new(self.resolver())
            .execute(token, scope)
            .await
    }

    // ========================================================================
    // Passwords
    // ========================================================================

    pub async fn request_password_reset(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> AuthResult<()> {
        RequestPasswordResetUseCase::new(self.provider.clone())
            .execute(email, redirect_to)
            .await
    }

    pub async fn reset_password(&self, reset_token: &str, new_password: &str) -> AuthResult<()> {
        ResetPasswordUseCase::new(self.provider.clone(), self.config.clone())
            .execute(reset_token, new_password)
            .await
    }

    pub async fn change_password(
        &self,
        token: Option<&str>,
        input: ChangePasswordInput,
    ) -> AuthResult<()> {
        ChangePasswordUseCase::new(self.resolver(), self.config.clone())
            .execute(token, input)
            .await
    }

    // ========================================================================
    // Guards
    // ========================================================================

    pub async fn check(&self, token: Option<&str>, options: &GuardOptions) -> AuthorizationDecision {
        AuthorizationGuard::new(self.resolver(), self.access.clone(), self.config.clone())
            .check(token, options)
            .await
    }

    /// Session plus whatever `options` requires
    pub async fn guard(&self, token: Option<&str>, options: GuardOptions) -> AuthorizationDecision {
        self.check(token, &options).await
    }

    /// Any of `roles`; permission requirements in `options` are ignored
    pub async fn role_guard<I, S>(
        &self,
        token: Option<&str>,
        roles: I,
        options: GuardOptions,
    ) -> AuthorizationDecision
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options.with_roles(roles).roles_only();
        self.check(token, &options).await
    }

    /// Any of `permissions`; role requirements in `options` are ignored
    pub async fn permission_guard<I, S>(
        &self,
        token: Option<&str>,
        permissions: I,
        options: GuardOptions,
    ) -> AuthorizationDecision
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options.with_permissions(permissions).permissions_only();
        self.check(token, &options).await
    }
}
