//! Auth (Authentication) Facade
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, decisions, provider ports
//! - `application/` - Use cases and the [`AuthFacade`] service object
//! - `infra/` - In-memory identity provider and static access resolver
//! - `presentation/` - HTTP handlers, DTOs, router, guard middleware
//!
//! ## Features
//! - Registration and email/password sign-in through an identity provider
//! - Session validation, freshness and refresh with provider-side rotation
//! - Sign-out of one session, all sessions, or all other sessions
//! - Role/permission guards that always return a structured decision
//! - Password reset (enumeration-safe) and password change
//!
//! ## Security Model
//! - Tokens are opaque; minting and verification belong to the provider
//! - Broad revocation and password changes act on the user of a verified
//!   session, never on a caller-supplied id
//! - The guard fails closed: any provider fault denies access

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use application::{AuthConfig, AuthFacade, GuardOptions};
pub use domain::{AuthorizationDecision, IdentityProvider, AccessResolver};
pub use error::{AuthError, AuthResult};
pub use infra::{MemoryIdentityProvider, MemoryProviderConfig, StaticAccessResolver};
pub use presentation::router::auth_router;

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

// Convenience re-exports
pub mod config {
    pub use crate::application::config::*;
}

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
    pub use crate::presentation::dto::*;
}

pub mod router {
    pub use crate::presentation::router::*;
}

pub mod middleware {
    pub use crate::presentation::middleware::*;
}
