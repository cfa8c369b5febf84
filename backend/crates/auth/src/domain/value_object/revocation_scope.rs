//! Revocation scope
//!
//! Breadth of a sign-out. Broad scopes always act on the user that owns the
//! presented session, never on a caller-supplied id.

use derive_more::Display;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RevocationScope {
    /// Only the presented session
    #[default]
    #[display("current")]
    Current,
    /// Every session of the owning user, the presented one included
    #[display("all")]
    AllForUser,
    /// Every session of the owning user except the presented one
    #[display("others")]
    AllOtherForUser,
}

impl RevocationScope {
    /// Whether the scope reaches beyond the presented session
    pub fn is_broad(&self) -> bool {
        !matches!(self, RevocationScope::Current)
    }
}
