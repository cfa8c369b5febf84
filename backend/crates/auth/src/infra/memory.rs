//! In-memory Identity Provider
//!
//! Reference implementation of [`IdentityProvider`] for development and
//! tests. State lives behind a `tokio::sync::RwLock` and is lost on restart.
//!
//! - Argon2id password hashes
//! - Random URL-safe session tokens with absolute expiry
//! - Rotation on an authoritative lookup once the update age has elapsed
//! - Reset tokens stored as SHA-256 digests, single use
//! - Reset links are queued in an outbox instead of being mailed

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use kernel::clock::{Clock, SystemClock};
use platform::client::ClientInfo;
use platform::crypto::{random_token, sha256};
use platform::password::{ClearTextPassword, HashedPassword};
use tokio::sync::RwLock;

use crate::domain::entity::{AuthenticatedSession, Session, User};
use crate::domain::provider::{
    IdentityProvider, LookupOptions, ProviderError, ProviderErrorCode, Registered, Registration,
    SignInCredentials,
};
use crate::domain::value_object::{email::Email, session_token::SessionToken, user_id::UserId};

/// Entropy of reset tokens, in bytes
const RESET_TOKEN_BYTES: usize = 32;

/// Provider configuration
#[derive(Debug, Clone)]
pub struct MemoryProviderConfig {
    /// Session lifetime with "Remember Me" (1 week)
    pub session_ttl: StdDuration,
    /// Session lifetime without "Remember Me" (12 hours)
    pub session_ttl_short: StdDuration,
    /// Minimum age before an authoritative lookup rotates a session (1 day)
    pub update_age: StdDuration,
    /// Reset token lifetime (1 hour)
    pub reset_token_ttl: StdDuration,
    /// Refuse sign-in until the email address is verified
    pub require_email_verification: bool,
}

impl Default for MemoryProviderConfig {
    fn default() -> Self {
        Self {
            session_ttl: StdDuration::from_secs(7 * 24 * 3600),
            session_ttl_short: StdDuration::from_secs(12 * 3600),
            update_age: StdDuration::from_secs(24 * 3600),
            reset_token_ttl: StdDuration::from_secs(3600),
            require_email_verification: false,
        }
    }
}

fn chrono_duration(d: StdDuration) -> Duration {
    Duration::from_std(d).unwrap_or(Duration::MAX)
}

/// A reset link waiting to be delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetMail {
    pub email: Email,
    /// Plain reset token; only its digest is stored
    pub reset_token: String,
    pub redirect_to: Option<String>,
    pub expires_at: DateTime<Utc>,
}

struct UserRecord {
    user: User,
    password: HashedPassword,
}

struct ResetTicket {
    user_id: UserId,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    users: HashMap<UserId, UserRecord>,
    user_ids_by_email: HashMap<Email, UserId>,
    /// Keyed by token
    sessions: HashMap<String, Session>,
    /// Keyed by SHA-256 of the reset token
    reset_tickets: HashMap<[u8; 32], ResetTicket>,
    outbox: Vec<ResetMail>,
}

impl State {
    fn user_by_email(&self, email: &Email) -> Option<&UserRecord> {
        self.user_ids_by_email
            .get(email)
            .and_then(|id| self.users.get(id))
    }

    fn revoke_user_sessions(&mut self, user_id: &UserId, keep: Option<&str>) -> u64 {
        let before = self.sessions.len();
        self.sessions
            .retain(|token, s| &s.user_id != user_id || Some(token.as_str()) == keep);
        (before - self.sessions.len()) as u64
    }
}

/// In-memory identity provider
#[derive(Clone)]
pub struct MemoryIdentityProvider {
    state: Arc<RwLock<State>>,
    config: Arc<MemoryProviderConfig>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self::new(MemoryProviderConfig::default())
    }
}

impl MemoryIdentityProvider {
    pub fn new(config: MemoryProviderConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            config: Arc::new(config),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &MemoryProviderConfig {
        &self.config
    }

    /// Mark an address as verified; false if no such user
    pub async fn verify_email(&self, email: &Email) -> bool {
        let mut state = self.state.write().await;
        let Some(id) = state.user_ids_by_email.get(email).cloned() else {
            return false;
        };
        let now = self.clock.now();
        match state.users.get_mut(&id) {
            Some(record) => {
                record.user.email_verified = true;
                record.user.updated_at = now;
                true
            }
            None => false,
        }
    }

    /// Take every queued reset mail
    pub async fn drain_outbox(&self) -> Vec<ResetMail> {
        std::mem::take(&mut self.state.write().await.outbox)
    }

    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    /// Drop expired sessions and reset tickets, returning how many went
    pub async fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        let before = state.sessions.len() + state.reset_tickets.len();
        state.sessions.retain(|_, s| !s.is_expired(now));
        state.reset_tickets.retain(|_, t| t.expires_at > now);
        let removed = before - (state.sessions.len() + state.reset_tickets.len());

        if removed > 0 {
            tracing::debug!(removed, "Expired sessions and reset tokens removed");
        }
        removed
    }

    fn issue_session(
        &self,
        user_id: UserId,
        ttl: Duration,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Session {
        let now = self.clock.now();
        Session {
            token: SessionToken::generate(),
            user_id,
            created_at: now,
            expires_at: now + ttl,
            ip_address,
            user_agent,
        }
    }
}

fn invalid_credentials() -> ProviderError {
    ProviderError::coded(
        ProviderErrorCode::InvalidCredentials,
        "Invalid email or password",
    )
}

fn hashing_failed(e: impl std::fmt::Display) -> ProviderError {
    ProviderError::coded(
        ProviderErrorCode::Unavailable,
        format!("Password hashing failed: {e}"),
    )
}

impl IdentityProvider for MemoryIdentityProvider {
    async fn create_session(
        &self,
        credentials: SignInCredentials,
        client: ClientInfo,
    ) -> Result<AuthenticatedSession, ProviderError> {
        let (user, hash) = {
            let state = self.state.read().await;
            let record = state
                .user_by_email(&credentials.email)
                .ok_or_else(invalid_credentials)?;
            (record.user.clone(), record.password.clone())
        };

        if !hash.verify(&credentials.password) {
            return Err(invalid_credentials());
        }

        if self.config.require_email_verification && !user.email_verified {
            return Err(ProviderError::coded(
                ProviderErrorCode::EmailNotVerified,
                "Email not verified",
            ));
        }

        let ttl = if credentials.remember_me {
            self.config.session_ttl
        } else {
            self.config.session_ttl_short
        };
        let session = self.issue_session(
            user.id.clone(),
            chrono_duration(ttl),
            client.ip_string(),
            client.user_agent,
        );

        self.state
            .write()
            .await
            .sessions
            .insert(session.token.as_str().to_string(), session.clone());

        Ok(AuthenticatedSession::new(session, user))
    }

    async fn register(
        &self,
        registration: Registration,
        client: ClientInfo,
    ) -> Result<Registered, ProviderError> {
        let hash = registration.password.hash().map_err(hashing_failed)?;
        let now = self.clock.now();

        let mut state = self.state.write().await;
        if state.user_ids_by_email.contains_key(&registration.email) {
            return Err(ProviderError::coded(
                ProviderErrorCode::UserAlreadyExists,
                "User already exists",
            ));
        }

        let user = User {
            id: UserId::generate(),
            email: registration.email.clone(),
            name: registration.name,
            image: registration.image,
            email_verified: false,
            created_at: now,
            updated_at: now,
        };

        state
            .user_ids_by_email
            .insert(registration.email, user.id.clone());
        state.users.insert(
            user.id.clone(),
            UserRecord {
                user: user.clone(),
                password: hash,
            },
        );

        let session = if self.config.require_email_verification {
            None
        } else {
            let session = self.issue_session(
                user.id.clone(),
                chrono_duration(self.config.session_ttl),
                client.ip_string(),
                client.user_agent,
            );
            state
                .sessions
                .insert(session.token.as_str().to_string(), session.clone());
            Some(session)
        };

        Ok(Registered { user, session })
    }

    async fn lookup_session(
        &self,
        token: &SessionToken,
        options: LookupOptions,
    ) -> Result<Option<AuthenticatedSession>, ProviderError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        let Some(session) = state.sessions.get(token.as_str()).cloned() else {
            return Ok(None);
        };

        if session.is_expired(now) {
            state.sessions.remove(token.as_str());
            return Ok(None);
        }

        let Some(user) = state.users.get(&session.user_id).map(|r| r.user.clone()) else {
            state.sessions.remove(token.as_str());
            return Ok(None);
        };

        if !options.bypass_cache || session.age(now) < chrono_duration(self.config.update_age) {
            return Ok(Some(AuthenticatedSession::new(session, user)));
        }

        // Rotate: same lifetime, new token, old token gone
        let ttl = session.expires_at - session.created_at;
        let rotated = self.issue_session(
            session.user_id.clone(),
            ttl,
            session.ip_address.clone(),
            session.user_agent.clone(),
        );
        state.sessions.remove(token.as_str());
        state
            .sessions
            .insert(rotated.token.as_str().to_string(), rotated.clone());

        tracing::debug!(
            user_id = %user.id,
            old = %token.redacted(),
            new = %rotated.token.redacted(),
            "Session rotated"
        );

        Ok(Some(AuthenticatedSession::new(rotated, user)))
    }

    async fn revoke_session(&self, token: &SessionToken) -> Result<(), ProviderError> {
        self.state.write().await.sessions.remove(token.as_str());
        Ok(())
    }

    async fn revoke_all_sessions(&self, user_id: &UserId) -> Result<u64, ProviderError> {
        Ok(self
            .state
            .write()
            .await
            .revoke_user_sessions(user_id, None))
    }

    async fn revoke_other_sessions(
        &self,
        keep: &SessionToken,
        user_id: &UserId,
    ) -> Result<u64, ProviderError> {
        Ok(self
            .state
            .write()
            .await
            .revoke_user_sessions(user_id, Some(keep.as_str())))
    }

    async fn change_credential(
        &self,
        user_id: &UserId,
        current: &ClearTextPassword,
        new: &ClearTextPassword,
    ) -> Result<(), ProviderError> {
        let hash = {
            let state = self.state.read().await;
            state
                .users
                .get(user_id)
                .map(|r| r.password.clone())
                .ok_or_else(|| {
                    ProviderError::coded(ProviderErrorCode::UserNotFound, "User not found")
                })?
        };

        if !hash.verify(current) {
            return Err(ProviderError::coded(
                ProviderErrorCode::IncorrectPassword,
                "Incorrect password",
            ));
        }

        let new_hash = new.hash().map_err(hashing_failed)?;
        let now = self.clock.now();

        let mut state = self.state.write().await;
        match state.users.get_mut(user_id) {
            Some(record) => {
                record.password = new_hash;
                record.user.updated_at = now;
                Ok(())
            }
            None => Err(ProviderError::coded(
                ProviderErrorCode::UserNotFound,
                "User not found",
            )),
        }
    }

    async fn request_password_reset(
        &self,
        email: &Email,
        redirect_to: Option<&str>,
    ) -> Result<(), ProviderError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        let Some(user_id) = state.user_ids_by_email.get(email).cloned() else {
            return Err(ProviderError::coded(
                ProviderErrorCode::UserNotFound,
                "User not found",
            ));
        };

        let reset_token = random_token(RESET_TOKEN_BYTES);
        let expires_at = now + chrono_duration(self.config.reset_token_ttl);

        state.reset_tickets.insert(
            sha256(reset_token.as_bytes()),
            ResetTicket {
                user_id,
                expires_at,
            },
        );
        state.outbox.push(ResetMail {
            email: email.clone(),
            reset_token,
            redirect_to: redirect_to.map(str::to_string),
            expires_at,
        });

        Ok(())
    }

    async fn reset_password(
        &self,
        reset_token: &str,
        new: &ClearTextPassword,
    ) -> Result<(), ProviderError> {
        let new_hash = new.hash().map_err(hashing_failed)?;
        let now = self.clock.now();
        let mut state = self.state.write().await;

        // Removed up front: a token is consumed even by a failed attempt
        let ticket = state
            .reset_tickets
            .remove(&sha256(reset_token.as_bytes()))
            .filter(|t| t.expires_at > now)
            .ok_or_else(|| {
                ProviderError::coded(ProviderErrorCode::InvalidToken, "Invalid or expired token")
            })?;

        let Some(record) = state.users.get_mut(&ticket.user_id) else {
            return Err(ProviderError::coded(
                ProviderErrorCode::InvalidToken,
                "Invalid or expired token",
            ));
        };
        record.password = new_hash;
        record.user.updated_at = now;

        // Whoever held the old password loses their sessions
        let revoked = state.revoke_user_sessions(&ticket.user_id, None);
        tracing::debug!(user_id = %ticket.user_id, revoked, "Sessions revoked after reset");

        Ok(())
    }
}
