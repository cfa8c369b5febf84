//! Auth Middleware
//!
//! Guards a route with a fixed [`GuardOptions`] value and maps the
//! decision onto HTTP:
//!
//! | Decision                   | Response                         |
//! |----------------------------|----------------------------------|
//! | `Granted`                  | handler runs, [`AuthContext`] set |
//! | `Denied` with redirect     | 303 See Other                    |
//! | `Denied`                   | 401 (500 for `AUTH_CHECK_ERROR`) |
//! | `DeniedInsufficientAccess` | 403                              |

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use crate::application::authorize::GuardOptions;
use crate::application::facade::AuthFacade;
use crate::domain::decision::{AuthorizationDecision, Principal};
use crate::domain::provider::{AccessResolver, IdentityProvider};
use crate::error::AuthError;
use crate::presentation::handlers::request_token;

/// Middleware state
pub struct GuardState<P, R>
where
    P: IdentityProvider,
    R: AccessResolver,
{
    pub facade: AuthFacade<P, R>,
    pub options: GuardOptions,
}

impl<P, R> GuardState<P, R>
where
    P: IdentityProvider,
    R: AccessResolver,
{
    pub fn new(facade: AuthFacade<P, R>, options: GuardOptions) -> Self {
        Self { facade, options }
    }
}

impl<P, R> Clone for GuardState<P, R>
where
    P: IdentityProvider,
    R: AccessResolver,
{
    fn clone(&self) -> Self {
        Self {
            facade: self.facade.clone(),
            options: self.options.clone(),
        }
    }
}

/// Granted principal, stored in request extensions
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub principal: Principal,
    pub fresh: Option<bool>,
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthError::Unauthenticated)
    }
}

/// Middleware that requires a guard decision of `Granted`
pub async fn require_auth<P, R>(
    State(state): State<GuardState<P, R>>,
    mut req: Request,
    next: Next,
) -> Response
where
    P: IdentityProvider + Send + Sync + 'static,
    R: AccessResolver + Send + Sync + 'static,
{
    let token = request_token(&state.facade, req.headers());

    let decision = state.facade.check(token.as_deref(), &state.options).await;

    if let Some(url) = decision.redirect_url() {
        return Redirect::to(url).into_response();
    }

    match decision {
        AuthorizationDecision::Granted { principal, fresh } => {
            req.extensions_mut().insert(AuthContext {
                principal: *principal,
                fresh,
            });
            next.run(req).await
        }
        denied => match denied.to_error() {
            Some(err) => err.into_response(),
            None => AuthError::Internal("Guard produced no decision".to_string()).into_response(),
        },
    }
}
