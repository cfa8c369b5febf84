//! Authorization decisions
//!
//! The guard never returns an error; every outcome, including internal
//! failures, is one of the variants of [`AuthorizationDecision`].

use std::collections::BTreeSet;

use derive_more::Display;

use crate::domain::entity::{AuthenticatedSession, Session, User};
use crate::error::AuthError;

/// Why an unauthenticated (or not sufficiently authenticated) caller was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum DenialReason {
    #[display("MISSING_HEADERS")]
    MissingHeaders,
    #[display("UNAUTHENTICATED")]
    Unauthenticated,
    #[display("SESSION_NOT_FRESH")]
    SessionNotFresh,
    #[display("AUTH_CHECK_ERROR")]
    AuthCheckError,
}

impl DenialReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenialReason::MissingHeaders => "MISSING_HEADERS",
            DenialReason::Unauthenticated => "UNAUTHENTICATED",
            DenialReason::SessionNotFresh => "SESSION_NOT_FRESH",
            DenialReason::AuthCheckError => "AUTH_CHECK_ERROR",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            DenialReason::MissingHeaders => "Request headers are required for authentication",
            DenialReason::Unauthenticated => "User is not authenticated",
            DenialReason::SessionNotFresh => "Session is not fresh enough",
            DenialReason::AuthCheckError => "Authentication check failed",
        }
    }
}

/// Why an authenticated caller was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum AccessReason {
    #[display("INSUFFICIENT_ROLES")]
    InsufficientRoles,
    #[display("INSUFFICIENT_PERMISSIONS")]
    InsufficientPermissions,
}

impl AccessReason {
    pub fn code(&self) -> &'static str {
        match self {
            AccessReason::InsufficientRoles => "INSUFFICIENT_ROLES",
            AccessReason::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AccessReason::InsufficientRoles => "Insufficient role-based access",
            AccessReason::InsufficientPermissions => "Insufficient permission-based access",
        }
    }
}

/// Resolved caller: session, user and whatever access data was fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub session: Session,
    pub user: User,
    pub roles: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
}

impl Principal {
    pub fn new(
        authenticated: AuthenticatedSession,
        roles: BTreeSet<String>,
        permissions: BTreeSet<String>,
    ) -> Self {
        Self {
            session: authenticated.session,
            user: authenticated.user,
            roles,
            permissions,
        }
    }

    /// True if any of `required` is held
    pub fn has_any_role<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required.iter().any(|r| self.roles.contains(r.as_ref()))
    }

    /// True if any of `required` is held
    pub fn has_any_permission<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required.iter().any(|p| self.permissions.contains(p.as_ref()))
    }
}

/// Outcome of a guard check
///
/// `DeniedInsufficientAccess` and `Granted` always carry a resolved
/// principal; `Denied` never does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationDecision {
    Denied {
        reason: DenialReason,
        /// Where the transport should send the caller, if anywhere
        redirect_url: Option<String>,
        /// Underlying failure, for `AUTH_CHECK_ERROR`
        detail: Option<String>,
    },
    DeniedInsufficientAccess {
        reason: AccessReason,
        principal: Box<Principal>,
    },
    Granted {
        principal: Box<Principal>,
        /// `Some(true)` only when freshness was required and held
        fresh: Option<bool>,
    },
}

impl AuthorizationDecision {
    pub fn denied(reason: DenialReason, redirect_url: Option<String>) -> Self {
        AuthorizationDecision::Denied {
            reason,
            redirect_url,
            detail: None,
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, AuthorizationDecision::Granted { .. })
    }

    /// Whether a session was resolved (granted or authenticated-but-forbidden)
    pub fn is_authenticated(&self) -> bool {
        self.principal().is_some()
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            AuthorizationDecision::Denied { .. } => None,
            AuthorizationDecision::DeniedInsufficientAccess { principal, .. }
            | AuthorizationDecision::Granted { principal, .. } => Some(principal),
        }
    }

    pub fn into_principal(self) -> Option<Principal> {
        match self {
            AuthorizationDecision::Denied { .. } => None,
            AuthorizationDecision::DeniedInsufficientAccess { principal, .. }
            | AuthorizationDecision::Granted { principal, .. } => Some(*principal),
        }
    }

    /// Redirect flag: set whenever a redirect URL accompanies a denial
    pub fn redirect(&self) -> bool {
        self.redirect_url().is_some()
    }

    pub fn redirect_url(&self) -> Option<&str> {
        match self {
            AuthorizationDecision::Denied { redirect_url, .. } => redirect_url.as_deref(),
            _ => None,
        }
    }

    /// Denial code, `None` when granted
    pub fn code(&self) -> Option<&'static str> {
        match self {
            AuthorizationDecision::Denied { reason, .. } => Some(reason.code()),
            AuthorizationDecision::DeniedInsufficientAccess { reason, .. } => Some(reason.code()),
            AuthorizationDecision::Granted { .. } => None,
        }
    }

    /// The error a transport should render for a denial
    pub fn to_error(&self) -> Option<AuthError> {
        match self {
            AuthorizationDecision::Denied { reason, detail, .. } => Some(match reason {
                DenialReason::MissingHeaders => AuthError::MissingHeaders,
                DenialReason::Unauthenticated => AuthError::Unauthenticated,
                DenialReason::SessionNotFresh => AuthError::SessionNotFresh,
                DenialReason::AuthCheckError => AuthError::AuthCheckError(
                    detail.clone().unwrap_or_else(|| reason.message().to_string()),
                ),
            }),
            AuthorizationDecision::DeniedInsufficientAccess { reason, .. } => Some(match reason {
                AccessReason::InsufficientRoles => AuthError::InsufficientRoles,
                AccessReason::InsufficientPermissions => AuthError::InsufficientPermissions,
            }),
            AuthorizationDecision::Granted { .. } => None,
        }
    }
}
