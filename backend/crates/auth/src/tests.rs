//! Scenario tests for the auth facade
//!
//! `RecordingProvider` counts every provider call so tests can assert what
//! did *not* happen (no broad revoke without a session, no authoritative
//! lookup inside the update window).

#[cfg(test)]
mod support {
    use std::collections::{BTreeSet, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use chrono::Duration;
    use kernel::clock::{Clock, ManualClock};
    use platform::client::ClientInfo;
    use platform::password::ClearTextPassword;

    use crate::application::{AuthConfig, AuthFacade};
    use crate::domain::entity::{AuthenticatedSession, Session, User};
    use crate::domain::provider::{
        AccessResolver, IdentityProvider, LookupOptions, ProviderError, Registered,
        Registration, SignInCredentials,
    };
    use crate::domain::value_object::{Email, SessionToken, UserId};

    #[derive(Default)]
    pub struct Calls {
        pub lookup_cached: AtomicUsize,
        pub lookup_authoritative: AtomicUsize,
        pub create_session: AtomicUsize,
        pub register: AtomicUsize,
        pub revoke_session: AtomicUsize,
        pub revoke_all: AtomicUsize,
        pub revoke_others: AtomicUsize,
        pub change_credential: AtomicUsize,
        pub request_reset: AtomicUsize,
        pub reset: AtomicUsize,
        /// User ids passed to broad revokes
        pub revoked_for: Mutex<Vec<UserId>>,
    }

    impl Calls {
        pub fn lookups(&self) -> usize {
            self.lookup_cached.load(Ordering::SeqCst)
                + self.lookup_authoritative.load(Ordering::SeqCst)
        }

        pub fn get(counter: &AtomicUsize) -> usize {
            counter.load(Ordering::SeqCst)
        }
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    /// Scriptable identity provider that records every call
    #[derive(Default)]
    pub struct RecordingProvider {
        pub calls: Arc<Calls>,
        /// Answer to cached lookups
        pub session: Option<AuthenticatedSession>,
        /// Answer to authoritative lookups; `None` means same as cached
        pub authoritative: Option<Option<AuthenticatedSession>>,
        pub lookup_error: Option<ProviderError>,
        pub sign_in_error: Option<ProviderError>,
        pub register_error: Option<ProviderError>,
        pub change_error: Option<ProviderError>,
        pub reset_request_error: Option<ProviderError>,
        pub reset_error: Option<ProviderError>,
        /// Tokens already revoked; a second revoke reports the session gone
        pub revoked: Mutex<HashSet<String>>,
    }

    impl RecordingProvider {
        pub fn with_session(session: AuthenticatedSession) -> Self {
            Self {
                session: Some(session),
                ..Default::default()
            }
        }
    }

    impl IdentityProvider for RecordingProvider {
        async fn create_session(
            &self,
            _credentials: SignInCredentials,
            _client: ClientInfo,
        ) -> Result<AuthenticatedSession, ProviderError> {
            bump(&self.calls.create_session);
            if let Some(e) = &self.sign_in_error {
                return Err(e.clone());
            }
            self.session
                .clone()
                .ok_or_else(|| ProviderError::new("Invalid email or password"))
        }

        async fn register(
            &self,
            _registration: Registration,
            _client: ClientInfo,
        ) -> Result<Registered, ProviderError> {
            bump(&self.calls.register);
            if let Some(e) = &self.register_error {
                return Err(e.clone());
            }
            let authenticated = self
                .session
                .clone()
                .ok_or_else(|| ProviderError::new("no fixture"))?;
            Ok(Registered {
                user: authenticated.user,
                session: Some(authenticated.session),
            })
        }

        async fn lookup_session(
            &self,
            token: &SessionToken,
            options: LookupOptions,
        ) -> Result<Option<AuthenticatedSession>, ProviderError> {
            if options.bypass_cache {
                bump(&self.calls.lookup_authoritative);
            } else {
                bump(&self.calls.lookup_cached);
            }
            if let Some(e) = &self.lookup_error {
                return Err(e.clone());
            }
            if options.bypass_cache {
                if let Some(answer) = &self.authoritative {
                    return Ok(answer.clone());
                }
            }
            Ok(self
                .session
                .clone()
                .filter(|a| &a.session.token == token))
        }

        async fn revoke_session(&self, token: &SessionToken) -> Result<(), ProviderError> {
            bump(&self.calls.revoke_session);
            let mut revoked = self.revoked.lock().unwrap();
            if !revoked.insert(token.as_str().to_string()) {
                return Err(ProviderError::new("Session not found or invalid"));
            }
            Ok(())
        }

        async fn revoke_all_sessions(&self, user_id: &UserId) -> Result<u64, ProviderError> {
            bump(&self.calls.revoke_all);
            self.calls.revoked_for.lock().unwrap().push(user_id.clone());
            Ok(3)
        }

        async fn revoke_other_sessions(
            &self,
            _keep: &SessionToken,
            user_id: &UserId,
        ) -> Result<u64, ProviderError> {
            bump(&self.calls.revoke_others);
            self.calls.revoked_for.lock().unwrap().push(user_id.clone());
            Ok(2)
        }

        async fn change_credential(
            &self,
            _user_id: &UserId,
            _current: &ClearTextPassword,
            _new: &ClearTextPassword,
        ) -> Result<(), ProviderError> {
            bump(&self.calls.change_credential);
            match &self.change_error {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }

        async fn request_password_reset(
            &self,
            _email: &Email,
            _redirect_to: Option<&str>,
        ) -> Result<(), ProviderError> {
            bump(&self.calls.request_reset);
            match &self.reset_request_error {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }

        async fn reset_password(
            &self,
            _reset_token: &str,
            _new: &ClearTextPassword,
        ) -> Result<(), ProviderError> {
            bump(&self.calls.reset);
            match &self.reset_error {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }
    }

    /// Access resolver whose backing store is down
    pub struct FailingAccess;

    impl AccessResolver for FailingAccess {
        async fn roles_of(&self, _user_id: &UserId) -> Result<BTreeSet<String>, ProviderError> {
            Err(ProviderError::new("role store unreachable"))
        }

        async fn permissions_of(
            &self,
            _user_id: &UserId,
        ) -> Result<BTreeSet<String>, ProviderError> {
            Ok(BTreeSet::new())
        }
    }

    pub const TOKEN: &str = "tok-acting-session";

    pub fn user() -> User {
        let at = chrono::Utc::now();
        User {
            id: UserId::new("usr_ada"),
            email: Email::new("ada@example.com").unwrap(),
            name: "Ada".to_string(),
            image: None,
            email_verified: true,
            created_at: at,
            updated_at: at,
        }
    }

    /// Session created `age` before the clock's now, valid for a week
    pub fn session_aged(clock: &ManualClock, age: Duration) -> AuthenticatedSession {
        let created_at = clock.now() - age;
        AuthenticatedSession::new(
            Session {
                token: SessionToken::parse(TOKEN).unwrap(),
                user_id: UserId::new("usr_ada"),
                created_at,
                expires_at: created_at + Duration::days(7),
                ip_address: Some("10.0.0.7".to_string()),
                user_agent: None,
            },
            user(),
        )
    }

    pub fn facade(provider: RecordingProvider, clock: &ManualClock) -> AuthFacade<RecordingProvider> {
        AuthFacade::new(provider, AuthConfig::default()).with_clock(clock.clone())
    }
}

// ============================================================================
// Session Resolver
// ============================================================================

#[cfg(test)]
mod resolver_tests {
    use super::support::*;
    use crate::domain::provider::ProviderError;
    use crate::error::AuthError;
    use chrono::Duration;
    use kernel::clock::ManualClock;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_missing_token_never_reaches_provider() {
        let clock = ManualClock::default();
        let provider = RecordingProvider::default();
        let calls = Arc::clone(&provider.calls);
        let facade = facade(provider, &clock);

        for token in [None, Some(""), Some("   ")] {
            let err = facade.validate(token, false).await.unwrap_err();
            assert!(matches!(err, AuthError::MissingToken), "{token:?}");
        }
        assert_eq!(calls.lookups(), 0);
    }

    #[tokio::test]
    async fn test_unknown_token_is_invalid_session() {
        let clock = ManualClock::default();
        let provider = RecordingProvider::with_session(session_aged(&clock, Duration::hours(1)));
        let facade = facade(provider, &clock);

        let err = facade.validate(Some("someone-else"), false).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpiredSession));
    }

    #[tokio::test]
    async fn test_provider_error_classification() {
        let clock = ManualClock::default();

        let expired = RecordingProvider {
            lookup_error: Some(ProviderError::new("Session has EXPIRED")),
            ..Default::default()
        };
        let err = facade(expired, &clock)
            .validate(Some(TOKEN), false)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpiredSession));

        let down = RecordingProvider {
            lookup_error: Some(ProviderError::new("connection refused")),
            ..Default::default()
        };
        let err = facade(down, &clock)
            .validate(Some(TOKEN), false)
            .await
            .unwrap_err();
        match err {
            AuthError::Provider(e) => assert_eq!(e.message, "connection refused"),
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_session_past_expiry_is_rejected_locally() {
        let clock = ManualClock::default();
        let provider = RecordingProvider::with_session(session_aged(&clock, Duration::days(8)));
        let err = facade(provider, &clock)
            .validate(Some(TOKEN), false)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpiredSession));
    }

    #[tokio::test]
    async fn test_disable_cookie_cache_is_authoritative() {
        let clock = ManualClock::default();
        let provider = RecordingProvider::with_session(session_aged(&clock, Duration::hours(1)));
        let calls = Arc::clone(&provider.calls);
        let facade = facade(provider, &clock);

        facade.validate(Some(TOKEN), true).await.unwrap();
        assert_eq!(Calls::get(&calls.lookup_authoritative), 1);
        assert_eq!(Calls::get(&calls.lookup_cached), 0);
    }
}

// ============================================================================
// Freshness
// ============================================================================

#[cfg(test)]
mod freshness_tests {
    use super::support::*;
    use chrono::Duration;
    use kernel::clock::ManualClock;

    #[test]
    fn test_disabled_threshold_is_always_fresh() {
        let clock = ManualClock::default();
        let facade = facade(RecordingProvider::default(), &clock);
        let old = session_aged(&clock, Duration::days(365));

        assert!(facade.is_fresh(&old.session, Some(0)));
        assert!(facade.is_fresh(&old.session, Some(-30)));
        assert!(!facade.is_fresh(&old.session, None));
    }

    #[test]
    fn test_exact_threshold_is_fresh() {
        let clock = ManualClock::default();
        let facade = facade(RecordingProvider::default(), &clock);
        let session = session_aged(&clock, Duration::seconds(600));

        assert!(facade.is_fresh(&session.session, Some(600)));
        assert!(!facade.is_fresh(&session.session, Some(599)));
    }
}

// ============================================================================
// Refresh Policy
// ============================================================================

#[cfg(test)]
mod refresh_tests {
    use super::support::*;
    use crate::error::AuthError;
    use chrono::Duration;
    use kernel::clock::ManualClock;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_young_session_is_returned_unchanged_with_one_call() {
        let clock = ManualClock::default();
        let current = session_aged(&clock, Duration::seconds(1));
        let provider = RecordingProvider::with_session(current.clone());
        let calls = Arc::clone(&provider.calls);
        let facade = facade(provider, &clock);

        let outcome = facade
            .refresh_with(Some(TOKEN), 86_400, false)
            .await
            .unwrap();

        assert_eq!(outcome.authenticated, current);
        assert!(!outcome.refreshed);
        assert!(!outcome.rotated);
        assert_eq!(calls.lookups(), 1);
        assert_eq!(Calls::get(&calls.lookup_authoritative), 0);
    }

    #[tokio::test]
    async fn test_zero_update_age_rechecks_instead_of_defaulting() {
        let clock = ManualClock::default();
        let provider = RecordingProvider::with_session(session_aged(&clock, Duration::seconds(1)));
        let calls = Arc::clone(&provider.calls);
        let facade = facade(provider, &clock);

        let outcome = facade.refresh_with(Some(TOKEN), 0, false).await.unwrap();
        assert!(outcome.refreshed);
        assert_eq!(Calls::get(&calls.lookup_authoritative), 1);
    }

    #[tokio::test]
    async fn test_force_always_rechecks() {
        let clock = ManualClock::default();
        let provider = RecordingProvider::with_session(session_aged(&clock, Duration::seconds(1)));
        let calls = Arc::clone(&provider.calls);
        let facade = facade(provider, &clock);

        let outcome = facade.refresh_with(Some(TOKEN), 86_400, true).await.unwrap();
        assert!(outcome.refreshed);
        assert_eq!(Calls::get(&calls.lookup_authoritative), 1);
    }

    #[tokio::test]
    async fn test_old_session_is_rechecked_and_rotation_surfaced() {
        let clock = ManualClock::default();
        let current = session_aged(&clock, Duration::days(2));
        let mut rotated = session_aged(&clock, Duration::zero());
        rotated.session.token = crate::domain::value_object::SessionToken::parse("tok-new").unwrap();

        let provider = RecordingProvider {
            session: Some(current),
            authoritative: Some(Some(rotated.clone())),
            ..Default::default()
        };
        let calls = Arc::clone(&provider.calls);
        let facade = facade(provider, &clock);

        let outcome = facade.refresh(Some(TOKEN), false).await.unwrap();
        assert!(outcome.refreshed);
        assert!(outcome.rotated);
        assert_eq!(outcome.authenticated.session.token.as_str(), "tok-new");
        assert_eq!(Calls::get(&calls.lookup_cached), 1);
        assert_eq!(Calls::get(&calls.lookup_authoritative), 1);
    }

    #[tokio::test]
    async fn test_vanished_on_recheck_is_refresh_failed() {
        let clock = ManualClock::default();
        let provider = RecordingProvider {
            session: Some(session_aged(&clock, Duration::days(2))),
            authoritative: Some(None),
            ..Default::default()
        };
        let err = facade(provider, &clock)
            .refresh(Some(TOKEN), false)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::RefreshFailed));
        assert_eq!(err.code(), "REFRESH_FAILED");
    }

    #[tokio::test]
    async fn test_invalid_initial_session_is_not_refresh_failed() {
        let clock = ManualClock::default();
        let err = facade(RecordingProvider::default(), &clock)
            .refresh(Some(TOKEN), true)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpiredSession));
    }
}

// ============================================================================
// Revocation Coordinator
// ============================================================================

#[cfg(test)]
mod revocation_tests {
    use super::support::*;
    use crate::domain::value_object::{RevocationScope, UserId};
    use crate::error::AuthError;
    use chrono::Duration;
    use kernel::clock::ManualClock;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_broad_revoke_without_token_calls_nothing() {
        let clock = ManualClock::default();
        let provider = RecordingProvider::with_session(session_aged(&clock, Duration::hours(1)));
        let calls = Arc::clone(&provider.calls);
        let facade = facade(provider, &clock);

        for scope in [RevocationScope::AllForUser, RevocationScope::AllOtherForUser] {
            let err = facade.logout(Some(""), scope).await.unwrap_err();
            assert!(matches!(err, AuthError::MissingToken), "{scope}");
        }
        assert_eq!(Calls::get(&calls.revoke_all), 0);
        assert_eq!(Calls::get(&calls.revoke_others), 0);
        assert_eq!(calls.lookups(), 0);
    }

    #[tokio::test]
    async fn test_broad_revoke_with_invalid_token_calls_nothing() {
        let clock = ManualClock::default();
        let provider = RecordingProvider::with_session(session_aged(&clock, Duration::hours(1)));
        let calls = Arc::clone(&provider.calls);
        let facade = facade(provider, &clock);

        let err = facade
            .logout(Some("forged"), RevocationScope::AllForUser)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpiredSession));
        assert_eq!(err.code(), "INVALID_SESSION");
        assert_eq!(Calls::get(&calls.revoke_all), 0);
    }

    #[tokio::test]
    async fn test_broad_revoke_targets_verified_user() {
        let clock = ManualClock::default();
        let provider = RecordingProvider::with_session(session_aged(&clock, Duration::hours(1)));
        let calls = Arc::clone(&provider.calls);
        let facade = facade(provider, &clock);

        let all = facade
            .logout(Some(TOKEN), RevocationScope::AllForUser)
            .await
            .unwrap();
        assert_eq!(all.sessions_revoked, Some(3));

        let others = facade
            .logout(Some(TOKEN), RevocationScope::AllOtherForUser)
            .await
            .unwrap();
        assert_eq!(others.sessions_revoked, Some(2));
        assert_eq!(others.user_id, Some(UserId::new("usr_ada")));

        assert_eq!(
            *calls.revoked_for.lock().unwrap(),
            vec![UserId::new("usr_ada"), UserId::new("usr_ada")]
        );
    }

    #[tokio::test]
    async fn test_current_requires_token() {
        let clock = ManualClock::default();
        let provider = RecordingProvider::default();
        let calls = Arc::clone(&provider.calls);
        let err = facade(provider, &clock)
            .logout(None, RevocationScope::Current)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingToken));
        assert_eq!(Calls::get(&calls.revoke_session), 0);
    }

    #[tokio::test]
    async fn test_current_is_idempotent() {
        let clock = ManualClock::default();
        let provider = RecordingProvider::with_session(session_aged(&clock, Duration::hours(1)));
        let calls = Arc::clone(&provider.calls);
        let facade = facade(provider, &clock);

        facade.logout(Some(TOKEN), RevocationScope::Current).await.unwrap();
        facade.logout(Some(TOKEN), RevocationScope::Current).await.unwrap();
        assert_eq!(Calls::get(&calls.revoke_session), 2);
    }
}

// ============================================================================
// Authorization Guard
// ============================================================================

#[cfg(test)]
mod guard_tests {
    use super::support::*;
    use crate::application::{AuthConfig, AuthFacade, GuardOptions};
    use crate::domain::decision::{AccessReason, AuthorizationDecision, DenialReason};
    use crate::domain::provider::ProviderError;
    use crate::domain::value_object::UserId;
    use crate::infra::StaticAccessResolver;
    use chrono::Duration;
    use kernel::clock::ManualClock;
    use std::sync::Arc;

    fn with_roles(
        provider: RecordingProvider,
        clock: &ManualClock,
        roles: &[&str],
        permissions: &[&str],
    ) -> AuthFacade<RecordingProvider, StaticAccessResolver> {
        let ada = UserId::new("usr_ada");
        facade(provider, clock).with_access_resolver(
            StaticAccessResolver::new()
                .with_roles(ada.clone(), roles.iter().copied())
                .with_permissions(ada, permissions.iter().copied()),
        )
    }

    fn reason(decision: &AuthorizationDecision) -> Option<DenialReason> {
        match decision {
            AuthorizationDecision::Denied { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_missing_token_without_redirect() {
        let clock = ManualClock::default();
        let decision = facade(RecordingProvider::default(), &clock)
            .guard(None, GuardOptions::new())
            .await;

        assert_eq!(reason(&decision), Some(DenialReason::MissingHeaders));
        assert!(!decision.redirect());
        assert!(decision.principal().is_none());
    }

    #[tokio::test]
    async fn test_redirect_is_echoed_by_every_denial_gate() {
        let clock = ManualClock::default();
        let options = GuardOptions::new()
            .require_fresh()
            .with_freshness_threshold(60)
            .with_redirect("/login");

        // Gate 1: presence
        let f = facade(RecordingProvider::default(), &clock);
        let d = f.check(None, &options).await;
        assert_eq!(reason(&d), Some(DenialReason::MissingHeaders));
        assert!(d.redirect());
        assert_eq!(d.redirect_url(), Some("/login"));

        // Gate 2: authentication
        let d = f.check(Some("unknown"), &options).await;
        assert_eq!(reason(&d), Some(DenialReason::Unauthenticated));
        assert_eq!(d.redirect_url(), Some("/login"));

        // Gate 3: freshness
        let stale = RecordingProvider::with_session(session_aged(&clock, Duration::hours(1)));
        let d = facade(stale, &clock).check(Some(TOKEN), &options).await;
        assert_eq!(reason(&d), Some(DenialReason::SessionNotFresh));
        assert_eq!(d.redirect_url(), Some("/login"));

        // Provider fault
        let down = RecordingProvider {
            lookup_error: Some(ProviderError::new("timeout")),
            ..Default::default()
        };
        let d = facade(down, &clock).check(Some(TOKEN), &options).await;
        assert_eq!(reason(&d), Some(DenialReason::AuthCheckError));
        assert_eq!(d.redirect_url(), Some("/login"));
    }

    #[tokio::test]
    async fn test_configured_default_redirect() {
        let clock = ManualClock::default();
        let config = AuthConfig {
            default_redirect_url: Some("/sign-in".to_string()),
            ..Default::default()
        };
        let facade = AuthFacade::new(RecordingProvider::default(), config).with_clock(clock);

        let d = facade.guard(None, GuardOptions::new()).await;
        assert_eq!(d.redirect_url(), Some("/sign-in"));

        let d = facade
            .guard(None, GuardOptions::new().with_redirect("/elsewhere"))
            .await;
        assert_eq!(d.redirect_url(), Some("/elsewhere"));
    }

    #[tokio::test]
    async fn test_wrong_role_is_forbidden_not_unauthenticated() {
        let clock = ManualClock::default();
        let provider = RecordingProvider::with_session(session_aged(&clock, Duration::hours(1)));
        let facade = with_roles(provider, &clock, &["user"], &[]);

        let d = facade
            .guard(Some(TOKEN), GuardOptions::new().with_roles(["admin"]))
            .await;

        match &d {
            AuthorizationDecision::DeniedInsufficientAccess { reason, principal } => {
                assert_eq!(*reason, AccessReason::InsufficientRoles);
                assert_eq!(principal.user.id, UserId::new("usr_ada"));
                assert!(principal.roles.contains("user"));
            }
            other => panic!("expected insufficient access, got {other:?}"),
        }
        assert!(d.is_authenticated());
        assert!(!d.is_granted());
    }

    #[tokio::test]
    async fn test_roles_use_or_semantics() {
        let clock = ManualClock::default();
        let provider = RecordingProvider::with_session(session_aged(&clock, Duration::hours(1)));
        let facade = with_roles(provider, &clock, &["user"], &[]);

        let d = facade
            .guard(Some(TOKEN), GuardOptions::new().with_roles(["admin", "user"]))
            .await;
        assert!(d.is_granted());
    }

    #[tokio::test]
    async fn test_permission_gate_after_role_gate() {
        let clock = ManualClock::default();
        let provider = RecordingProvider::with_session(session_aged(&clock, Duration::hours(1)));
        let facade = with_roles(provider, &clock, &["user"], &["posts:read"]);

        let options = GuardOptions::new()
            .with_roles(["user"])
            .with_permissions(["posts:write", "posts:delete"]);
        let d = facade.guard(Some(TOKEN), options).await;
        assert_eq!(d.code(), Some("INSUFFICIENT_PERMISSIONS"));

        let options = GuardOptions::new()
            .with_roles(["admin"])
            .with_permissions(["posts:write"]);
        let d = facade.guard(Some(TOKEN), options).await;
        assert_eq!(d.code(), Some("INSUFFICIENT_ROLES"));
    }

    #[tokio::test]
    async fn test_specialized_guards_clear_the_other_constraint() {
        let clock = ManualClock::default();
        let provider = RecordingProvider::with_session(session_aged(&clock, Duration::hours(1)));
        let facade = with_roles(provider, &clock, &["user"], &["posts:read"]);

        let d = facade
            .role_guard(
                Some(TOKEN),
                ["user"],
                GuardOptions::new().with_permissions(["root"]),
            )
            .await;
        assert!(d.is_granted());

        let d = facade
            .permission_guard(
                Some(TOKEN),
                ["posts:read"],
                GuardOptions::new().with_roles(["root"]),
            )
            .await;
        assert!(d.is_granted());
    }

    #[tokio::test]
    async fn test_freshness_checked_before_roles() {
        let clock = ManualClock::default();
        let provider = RecordingProvider::with_session(session_aged(&clock, Duration::hours(2)));
        let facade = with_roles(provider, &clock, &[], &[]);

        let options = GuardOptions::new()
            .require_fresh()
            .with_freshness_threshold(3600)
            .with_roles(["admin"]);
        let d = facade.guard(Some(TOKEN), options).await;
        assert_eq!(reason(&d), Some(DenialReason::SessionNotFresh));
    }

    #[tokio::test]
    async fn test_fresh_flag_only_when_required() {
        let clock = ManualClock::default();
        let provider = RecordingProvider::with_session(session_aged(&clock, Duration::minutes(5)));
        let facade = facade(provider, &clock);

        match facade.guard(Some(TOKEN), GuardOptions::new()).await {
            AuthorizationDecision::Granted { fresh, principal } => {
                assert_eq!(fresh, None);
                assert!(principal.roles.is_empty());
            }
            other => panic!("expected granted, got {other:?}"),
        }

        match facade
            .guard(Some(TOKEN), GuardOptions::new().require_fresh())
            .await
        {
            AuthorizationDecision::Granted { fresh, .. } => assert_eq!(fresh, Some(true)),
            other => panic!("expected granted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_access_resolver_failure_fails_closed() {
        let clock = ManualClock::default();
        let provider = RecordingProvider::with_session(session_aged(&clock, Duration::hours(1)));
        let calls = Arc::clone(&provider.calls);
        let facade = facade(provider, &clock).with_access_resolver(FailingAccess);

        let d = facade.guard(Some(TOKEN), GuardOptions::new()).await;
        match d {
            AuthorizationDecision::Denied { reason, detail, .. } => {
                assert_eq!(reason, DenialReason::AuthCheckError);
                assert_eq!(detail.as_deref(), Some("role store unreachable"));
            }
            other => panic!("expected denial, got {other:?}"),
        }
        assert_eq!(calls.lookups(), 1);
    }

    #[tokio::test]
    async fn test_invalid_message_from_provider_is_unauthenticated() {
        let clock = ManualClock::default();
        let provider = RecordingProvider {
            lookup_error: Some(ProviderError::new("Invalid session token")),
            ..Default::default()
        };
        let d = facade(provider, &clock)
            .guard(Some(TOKEN), GuardOptions::new())
            .await;
        assert_eq!(reason(&d), Some(DenialReason::Unauthenticated));
    }
}

// ============================================================================
// Credentials and passwords
// ============================================================================

#[cfg(test)]
mod credential_tests {
    use super::support::*;
    use crate::application::password::ChangePasswordInput;
    use crate::application::{SignInInput, SignUpInput};
    use crate::domain::provider::{ProviderError, ProviderErrorCode};
    use crate::error::AuthError;
    use chrono::Duration;
    use kernel::clock::ManualClock;
    use platform::client::ClientInfo;
    use std::sync::Arc;

    fn sign_up(email: &str, password: &str, name: &str) -> SignUpInput {
        SignUpInput {
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_sign_up_validation_precedes_provider() {
        let clock = ManualClock::default();
        let provider = RecordingProvider::default();
        let calls = Arc::clone(&provider.calls);
        let facade = facade(provider, &clock);

        let cases = [
            (sign_up("", "longenough", "Ada"), "MISSING_REQUIRED_FIELDS"),
            (sign_up("ada@example.com", "longenough", " "), "MISSING_REQUIRED_FIELDS"),
            (sign_up("not-an-email", "longenough", "Ada"), "INVALID_EMAIL_FORMAT"),
            (sign_up("ada@example.com", "short", "Ada"), "WEAK_PASSWORD"),
        ];
        for (input, code) in cases {
            let err = facade.register(input, ClientInfo::default()).await.unwrap_err();
            assert_eq!(err.code(), code);
        }
        assert_eq!(Calls::get(&calls.register), 0);
    }

    #[tokio::test]
    async fn test_sign_up_existing_user() {
        let clock = ManualClock::default();
        let provider = RecordingProvider {
            register_error: Some(ProviderError::new("User already exists")),
            ..Default::default()
        };
        let err = facade(provider, &clock)
            .register(sign_up("ada@example.com", "longenough", "Ada"), ClientInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserExists));
    }

    #[tokio::test]
    async fn test_sign_in_error_mapping() {
        let clock = ManualClock::default();
        let input = || SignInInput {
            email: "ada@example.com".to_string(),
            password: "whatever1".to_string(),
            remember_me: true,
        };

        let provider = RecordingProvider {
            sign_in_error: Some(ProviderError::new("Invalid email or password")),
            ..Default::default()
        };
        let err = facade(provider, &clock)
            .login(input(), ClientInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let provider = RecordingProvider {
            sign_in_error: Some(ProviderError::coded(
                ProviderErrorCode::EmailNotVerified,
                "Please verify",
            )),
            ..Default::default()
        };
        let err = facade(provider, &clock)
            .login(input(), ClientInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailNotVerified));

        let err = facade(RecordingProvider::default(), &clock)
            .login(
                SignInInput {
                    password: String::new(),
                    ..input()
                },
                ClientInfo::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "MISSING_REQUIRED_FIELDS");
    }

    #[tokio::test]
    async fn test_reset_request_does_not_reveal_unknown_accounts() {
        let clock = ManualClock::default();
        let provider = RecordingProvider {
            reset_request_error: Some(ProviderError::new("User not found")),
            ..Default::default()
        };
        let facade = facade(provider, &clock);

        facade
            .request_password_reset("nobody@example.com", None)
            .await
            .unwrap();

        let err = facade.request_password_reset("", None).await.unwrap_err();
        assert_eq!(err.code(), "MISSING_EMAIL");
    }

    #[tokio::test]
    async fn test_reset_password_validation_and_mapping() {
        let clock = ManualClock::default();
        let provider = RecordingProvider {
            reset_error: Some(ProviderError::new("Token expired")),
            ..Default::default()
        };
        let calls = Arc::clone(&provider.calls);
        let facade = facade(provider, &clock);

        let err = facade.reset_password("", "longenough").await.unwrap_err();
        assert!(matches!(err, AuthError::MissingResetToken));
        assert_eq!(err.code(), "MISSING_TOKEN");

        let err = facade.reset_password("tok", "").await.unwrap_err();
        assert_eq!(err.code(), "MISSING_PASSWORD");

        let err = facade.reset_password("tok", "short").await.unwrap_err();
        assert_eq!(err.code(), "WEAK_PASSWORD");
        assert_eq!(Calls::get(&calls.reset), 0);

        let err = facade.reset_password("tok", "longenough").await.unwrap_err();
        assert_eq!(err.code(), "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn test_change_password_needs_verified_session() {
        let clock = ManualClock::default();
        let provider = RecordingProvider::default();
        let calls = Arc::clone(&provider.calls);
        let facade = facade(provider, &clock);

        let input = || ChangePasswordInput {
            current_password: "oldpassword".to_string(),
            new_password: "newpassword".to_string(),
            revoke_other_sessions: false,
        };

        let err = facade.change_password(None, input()).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingToken));

        let err = facade.change_password(Some(TOKEN), input()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpiredSession));

        assert_eq!(Calls::get(&calls.change_credential), 0);
    }

    #[tokio::test]
    async fn test_change_password_incorrect_and_revoke_others() {
        let clock = ManualClock::default();
        let provider = RecordingProvider {
            change_error: Some(ProviderError::new("Incorrect password")),
            ..RecordingProvider::with_session(session_aged(&clock, Duration::hours(1)))
        };
        let err = facade(provider, &clock)
            .change_password(
                Some(TOKEN),
                ChangePasswordInput {
                    current_password: "wrongpassword".to_string(),
                    new_password: "newpassword".to_string(),
                    revoke_other_sessions: true,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INCORRECT_CURRENT_PASSWORD");

        let provider = RecordingProvider::with_session(session_aged(&clock, Duration::hours(1)));
        let calls = Arc::clone(&provider.calls);
        facade(provider, &clock)
            .change_password(
                Some(TOKEN),
                ChangePasswordInput {
                    current_password: "oldpassword".to_string(),
                    new_password: "newpassword".to_string(),
                    revoke_other_sessions: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(Calls::get(&calls.change_credential), 1);
        assert_eq!(Calls::get(&calls.revoke_others), 1);
        assert_eq!(Calls::get(&calls.revoke_all), 0);
    }
}

// ============================================================================
// HTTP
// ============================================================================

#[cfg(test)]
mod http_tests {
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::application::{AuthConfig, AuthFacade, GuardOptions};
    use crate::domain::provider::IdentityProvider;
    use crate::domain::provider::Registration;
    use crate::domain::value_object::Email;
    use crate::infra::{MemoryIdentityProvider, MemoryProviderConfig, StaticAccessResolver};
    use crate::presentation::router::{auth_router, auth_router_with_guard};
    use platform::client::ClientInfo;
    use platform::password::ClearTextPassword;

    fn app() -> Router {
        auth_router(AuthFacade::new(
            MemoryIdentityProvider::default(),
            AuthConfig::development(),
        ))
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// `name=value` part of the Set-Cookie header
    fn cookie_of(response: &axum::response::Response) -> String {
        response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string()
    }

    async fn signed_up(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(post(
                "/sign-up",
                json!({"email": "ada@example.com", "password": "correct horse", "name": "Ada"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        cookie_of(&response)
    }

    #[tokio::test]
    async fn test_sign_up_then_session() {
        let app = app();
        let cookie = signed_up(&app).await;
        assert!(cookie.starts_with("auth.session_token="));

        let response = app
            .clone()
            .oneshot(get("/session", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["user"]["email"], "ada@example.com");
        assert_eq!(body["fresh"], true);
        assert!(body["session"]["expiresAt"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_authoritative_session_check_reissues_rotated_cookie() {
        let provider = MemoryIdentityProvider::new(MemoryProviderConfig {
            update_age: std::time::Duration::ZERO,
            ..Default::default()
        });
        let app = auth_router(AuthFacade::new(provider, AuthConfig::development()));
        let cookie = signed_up(&app).await;

        let response = app
            .clone()
            .oneshot(get("/session?disableCookieCache=true", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let rotated = cookie_of(&response);
        assert_ne!(rotated, cookie);

        let body = json_body(response).await;
        assert_eq!(
            format!("auth.session_token={}", body["session"]["token"].as_str().unwrap()),
            rotated
        );

        // The old token is gone, the reissued one works
        let stale = app
            .clone()
            .oneshot(get("/session", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);

        let response = app.oneshot(get("/session", Some(&rotated))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_bearer_token_is_accepted() {
        let app = app();
        let cookie = signed_up(&app).await;
        let token = cookie.split_once('=').unwrap().1.to_string();

        let request = Request::builder()
            .uri("/me")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["user"]["name"], "Ada");
    }

    #[tokio::test]
    async fn test_session_without_token() {
        let response = app().oneshot(get("/session", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["code"], "MISSING_TOKEN");
    }

    #[tokio::test]
    async fn test_me_without_token_is_missing_headers() {
        let response = app().oneshot(get("/me", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["code"], "MISSING_HEADERS");
    }

    #[tokio::test]
    async fn test_guard_redirects_when_configured() {
        let app = auth_router_with_guard(
            AuthFacade::new(MemoryIdentityProvider::default(), AuthConfig::development()),
            GuardOptions::new().with_redirect("/login"),
        );
        let response = app.oneshot(get("/me", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn test_guard_forbids_missing_role() {
        let provider = MemoryIdentityProvider::default();
        let registered = provider
            .register(
                Registration {
                    email: Email::new("ada@example.com").unwrap(),
                    password: ClearTextPassword::new("correct horse").unwrap(),
                    name: "Ada".to_string(),
                    image: None,
                    callback_url: None,
                },
                ClientInfo::default(),
            )
            .await
            .unwrap();
        let token = registered.session.unwrap().token;

        let facade = AuthFacade::new(provider, AuthConfig::development())
            .with_access_resolver(StaticAccessResolver::new().with_roles(registered.user.id, ["user"]));

        let forbidden = auth_router_with_guard(facade.clone(), GuardOptions::new().with_roles(["admin"]));
        let cookie = format!("auth.session_token={}", token.as_str());
        let response = forbidden.oneshot(get("/me", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["code"], "INSUFFICIENT_ROLES");

        let allowed = auth_router_with_guard(facade, GuardOptions::new().with_roles(["admin", "user"]));
        let response = allowed.oneshot(get("/me", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["roles"], json!(["user"]));
    }

    #[tokio::test]
    async fn test_sign_out_all_invalidates_session() {
        let app = app();
        let cookie = signed_up(&app).await;

        let request = Request::builder()
            .method("POST")
            .uri("/sign-out")
            .header(header::COOKIE, &cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"scope": "allForUser"}).to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(cookie_of(&response).ends_with('='));
        assert_eq!(json_body(response).await["sessionsRevoked"], 1);

        let response = app.oneshot(get("/session", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["code"], "INVALID_SESSION");
    }

    #[tokio::test]
    async fn test_sign_out_without_body_twice() {
        let app = app();
        let cookie = signed_up(&app).await;

        for _ in 0..2 {
            let request = Request::builder()
                .method("POST")
                .uri("/sign-out")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_sign_in_with_wrong_password() {
        let app = app();
        signed_up(&app).await;

        let response = app
            .oneshot(post(
                "/sign-in",
                json!({"email": "ada@example.com", "password": "wrong horse"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn test_forgot_password_same_answer_for_unknown_email() {
        let app = app();
        signed_up(&app).await;

        let known = app
            .clone()
            .oneshot(post("/password/forgot", json!({"email": "ada@example.com"})))
            .await
            .unwrap();
        let unknown = app
            .oneshot(post("/password/forgot", json!({"email": "bob@example.com"})))
            .await
            .unwrap();

        assert_eq!(known.status(), StatusCode::OK);
        assert_eq!(unknown.status(), StatusCode::OK);
        assert_eq!(json_body(known).await, json_body(unknown).await);
    }

    #[tokio::test]
    async fn test_refresh_with_malformed_body() {
        let app = app();
        let cookie = signed_up(&app).await;

        let request = Request::builder()
            .method("POST")
            .uri("/session/refresh")
            .header(header::COOKIE, &cookie)
            .body(Body::from("{force"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
