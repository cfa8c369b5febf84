//! Auth Router

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::application::authorize::GuardOptions;
use crate::application::facade::AuthFacade;
use crate::domain::provider::{AccessResolver, IdentityProvider};
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::{GuardState, require_auth};

/// Create the Auth router; `/me` requires any valid session
pub fn auth_router<P, R>(facade: AuthFacade<P, R>) -> Router
where
    P: IdentityProvider + Send + Sync + 'static,
    R: AccessResolver + Send + Sync + 'static,
{
    auth_router_with_guard(facade, GuardOptions::default())
}

/// Create the Auth router with custom requirements on `/me`
pub fn auth_router_with_guard<P, R>(facade: AuthFacade<P, R>, me_guard: GuardOptions) -> Router
where
    P: IdentityProvider + Send + Sync + 'static,
    R: AccessResolver + Send + Sync + 'static,
{
    let protected = guarded(
        Router::new().route("/me", get(handlers::me)),
        facade.clone(),
        me_guard,
    );

    let state = AuthAppState { facade };

    Router::new()
        .route("/sign-up", post(handlers::sign_up::<P, R>))
        .route("/sign-in", post(handlers::sign_in::<P, R>))
        .route("/sign-out", post(handlers::sign_out::<P, R>))
        .route("/session", get(handlers::get_session::<P, R>))
        .route("/session/refresh", post(handlers::refresh_session::<P, R>))
        .route("/password/forgot", post(handlers::forgot_password::<P, R>))
        .route("/password/reset", post(handlers::reset_password::<P, R>))
        .route("/password/change", post(handlers::change_password::<P, R>))
        .with_state(state)
        .merge(protected)
}

/// Put every route of `router` behind a guard
pub fn guarded<P, R>(router: Router, facade: AuthFacade<P, R>, options: GuardOptions) -> Router
where
    P: IdentityProvider + Send + Sync + 'static,
    R: AccessResolver + Send + Sync + 'static,
{
    router.route_layer(middleware::from_fn_with_state(
        GuardState::new(facade, options),
        require_auth::<P, R>,
    ))
}
