//! User identifier
//!
//! Issued by the identity provider and treated as an opaque string.

use kernel::id::Id;

pub struct UserMarker;
pub type UserId = Id<UserMarker>;
