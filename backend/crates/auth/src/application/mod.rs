//! Application Layer
//!
//! Use cases and the facade that bundles them.

pub mod authorize;
pub mod config;
pub mod facade;
pub mod password;
pub mod refresh_session;
pub mod resolve_session;
pub mod revoke_session;
pub mod sign_in;
pub mod sign_up;

// Re-exports
pub use authorize::{AuthorizationGuard, GuardOptions};
pub use config::AuthConfig;
pub use facade::AuthFacade;
pub use password::{
    ChangePasswordInput, ChangePasswordUseCase, RequestPasswordResetUseCase, ResetPasswordUseCase,
};
pub use refresh_session::{RefreshOutcome, RefreshSessionUseCase};
pub use resolve_session::SessionResolver;
pub use revoke_session::{RevocationOutcome, RevokeSessionUseCase};
pub use sign_in::{SignInInput, SignInUseCase};
pub use sign_up::{SignUpInput, SignUpUseCase};
