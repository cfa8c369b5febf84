//! Entity Module

pub mod session;
pub mod user;

pub use session::Session;
pub use user::User;

/// A resolved session together with its owning user
///
/// Only ever built from a provider lookup that succeeded, so holding one
/// means the token was verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSession {
    pub session: Session,
    pub user: User,
}

impl AuthenticatedSession {
    pub fn new(session: Session, user: User) -> Self {
        Self { session, user }
    }
}
