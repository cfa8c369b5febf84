//! Domain Layer
//!
//! Entities, value objects, decision types, provider ports and the pure
//! time rules.

pub mod decision;
pub mod entity;
pub mod freshness;
pub mod provider;
pub mod value_object;

// Re-exports
pub use decision::{AccessReason, AuthorizationDecision, DenialReason, Principal};
pub use entity::{AuthenticatedSession, Session, User};
pub use provider::{
    AccessResolver, IdentityProvider, LookupOptions, NoAccessResolver, ProviderError,
    ProviderErrorCode,
};
