//! Static Access Resolver
//!
//! Roles and permissions from a fixed table, built once at startup.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::domain::provider::{AccessResolver, ProviderError};
use crate::domain::value_object::user_id::UserId;

#[derive(Debug, Default, Clone)]
struct Grants {
    roles: BTreeSet<String>,
    permissions: BTreeSet<String>,
}

/// Fixed role/permission table keyed by user id
///
/// Users missing from the table hold nothing.
#[derive(Debug, Clone, Default)]
pub struct StaticAccessResolver {
    grants: Arc<HashMap<UserId, Grants>>,
}

impl StaticAccessResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roles<I, S>(self, user_id: UserId, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.update(user_id, |g| g.roles.extend(roles.into_iter().map(Into::into)))
    }

    pub fn with_permissions<I, S>(self, user_id: UserId, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.update(user_id, |g| {
            g.permissions
                .extend(permissions.into_iter().map(Into::into))
        })
    }

    fn update(self, user_id: UserId, f: impl FnOnce(&mut Grants)) -> Self {
        let mut grants = Arc::unwrap_or_clone(self.grants);
        f(grants.entry(user_id).or_default());
        Self {
            grants: Arc::new(grants),
        }
    }
}

impl AccessResolver for StaticAccessResolver {
    async fn roles_of(&self, user_id: &UserId) -> Result<BTreeSet<String>, ProviderError> {
        Ok(self
            .grants
            .get(user_id)
            .map(|g| g.roles.clone())
            .unwrap_or_default())
    }

    async fn permissions_of(&self, user_id: &UserId) -> Result<BTreeSet<String>, ProviderError> {
        Ok(self
            .grants
            .get(user_id)
            .map(|g| g.permissions.clone())
            .unwrap_or_default())
    }
}
