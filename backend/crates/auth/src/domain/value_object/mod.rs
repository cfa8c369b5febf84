//! Value Object Module

pub mod email;
pub mod revocation_scope;
pub mod session_token;
pub mod user_id;

pub use email::Email;
pub use revocation_scope::RevocationScope;
pub use session_token::SessionToken;
pub use user_id::{UserId, UserMarker};
