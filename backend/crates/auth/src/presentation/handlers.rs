//! HTTP Handlers

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, FromRequestParts, Query, State};
use axum::http::{HeaderMap, header, request::Parts};
use axum::response::{IntoResponse, Response};
use kernel::error::app_error::AppError;
use platform::client::{ClientInfo, extract_client_info};
use platform::cookie::{extract_session_token, set_cookie_header};
use serde::de::DeserializeOwned;

use crate::application::facade::AuthFacade;
use crate::application::password::ChangePasswordInput;
use crate::application::sign_in::SignInInput;
use crate::application::sign_up::SignUpInput;
use crate::domain::entity::Session;
use crate::domain::provider::{AccessResolver, IdentityProvider};
use crate::domain::value_object::revocation_scope::RevocationScope;
use crate::error::AuthResult;
use crate::presentation::dto::{
    AuthResponse, ChangePasswordRequest, ForgotPasswordRequest, MeResponse, MessageResponse,
    RefreshRequest, RefreshResponse, ResetPasswordRequest, SessionDto, SessionQuery,
    SessionResponse, SignInRequest, SignOutRequest, SignOutResponse, SignUpRequest, UserDto,
};
use crate::presentation::middleware::AuthContext;

/// Shared state for auth handlers
pub struct AuthAppState<P, R>
where
    P: IdentityProvider,
    R: AccessResolver,
{
    pub facade: AuthFacade<P, R>,
}

impl<P, R> Clone for AuthAppState<P, R>
where
    P: IdentityProvider,
    R: AccessResolver,
{
    fn clone(&self) -> Self {
        Self {
            facade: self.facade.clone(),
        }
    }
}

/// Client IP and User-Agent of the request
///
/// The peer address is used when the server was started with connect info.
pub struct Client(pub ClientInfo);

impl<S> FromRequestParts<S> for Client
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let direct_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());

        Ok(Client(extract_client_info(&parts.headers, direct_ip)))
    }
}

// ============================================================================
// Sign Up
// ============================================================================

/// POST /api/auth/sign-up
pub async fn sign_up<P, R>(
    State(state): State<AuthAppState<P, R>>,
    Client(client): Client,
    Json(req): Json<SignUpRequest>,
) -> AuthResult<Response>
where
    P: IdentityProvider + Send + Sync + 'static,
    R: AccessResolver + Send + Sync + 'static,
{
    let input = SignUpInput {
        email: req.email,
        password: req.password,
        name: req.name,
        image: req.image,
        callback_url: req.callback_url,
    };

    let registered = state.facade.register(input, client).await?;

    let body = AuthResponse {
        user: UserDto::from(&registered.user),
        session: registered.session.as_ref().map(SessionDto::from),
    };

    Ok(match &registered.session {
        Some(session) => (
            [(header::SET_COOKIE, session_cookie(&state.facade, session))],
            Json(body),
        )
            .into_response(),
        None => Json(body).into_response(),
    })
}

// ============================================================================
// Sign In
// ============================================================================

/// POST /api/auth/sign-in
pub async fn sign_in<P, R>(
    State(state): State<AuthAppState<P, R>>,
    Client(client): Client,
    Json(req): Json<SignInRequest>,
) -> AuthResult<impl IntoResponse>
where
    P: IdentityProvider + Send + Sync + 'static,
    R: AccessResolver + Send + Sync + 'static,
{
    let input = SignInInput {
        email: req.email,
        password: req.password,
        remember_me: req.remember_me,
    };

    let authenticated = state.facade.login(input, client).await?;

    let cookie = session_cookie(&state.facade, &authenticated.session);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            user: UserDto::from(&authenticated.user),
            session: Some(SessionDto::from(&authenticated.session)),
        }),
    ))
}

// ============================================================================
// Sign Out
// ============================================================================

/// POST /api/auth/sign-out
///
/// The body is optional; without one only the current session is revoked.
pub async fn sign_out<P, R>(
    State(state): State<AuthAppState<P, R>>,
    headers: HeaderMap,
    body: Bytes,
) -> AuthResult<Response>
where
    P: IdentityProvider + Send + Sync + 'static,
    R: AccessResolver + Send + Sync + 'static,
{
    let req: SignOutRequest = optional_json(&body)?;
    let token = request_token(&state.facade, &headers);

    let outcome = state.facade.logout(token.as_deref(), req.scope).await?;

    let body = Json(SignOutResponse {
        success: true,
        scope: outcome.scope,
        sessions_revoked: outcome.sessions_revoked,
    });

    // The acting session survives "all others"
    if outcome.scope == RevocationScope::AllOtherForUser {
        return Ok(body.into_response());
    }

    let cookie = state.facade.config().cookie_config().build_delete_cookie();
    Ok(([(header::SET_COOKIE, set_cookie_header(&cookie))], body).into_response())
}

// ============================================================================
// Session
// ============================================================================

/// GET /api/auth/session
///
/// An authoritative lookup may rotate the session; the new token is then
/// sent back as a cookie.
pub async fn get_session<P, R>(
    State(state): State<AuthAppState<P, R>>,
    headers: HeaderMap,
    Query(query): Query<SessionQuery>,
) -> AuthResult<Response>
where
    P: IdentityProvider + Send + Sync + 'static,
    R: AccessResolver + Send + Sync + 'static,
{
    let token = request_token(&state.facade, &headers);
    let authenticated = state
        .facade
        .validate(token.as_deref(), query.disable_cookie_cache)
        .await?;
    let session = &authenticated.session;

    let body = Json(SessionResponse {
        user: UserDto::from(&authenticated.user),
        session: SessionDto::from(session),
        fresh: state.facade.is_fresh(session, None),
    });

    let rotated = token.as_deref().map(str::trim) != Some(session.token.as_str());
    if rotated {
        let cookie = session_cookie(&state.facade, session);
        return Ok(([(header::SET_COOKIE, cookie)], body).into_response());
    }

    Ok(body.into_response())
}

/// POST /api/auth/session/refresh
pub async fn refresh_session<P, R>(
    State(state): State<AuthAppState<P, R>>,
    headers: HeaderMap,
    body: Bytes,
) -> AuthResult<Response>
where
    P: IdentityProvider + Send + Sync + 'static,
    R: AccessResolver + Send + Sync + 'static,
{
    let req: RefreshRequest = optional_json(&body)?;
    let token = request_token(&state.facade, &headers);

    let outcome = state.facade.refresh(token.as_deref(), req.force).await?;
    let session = &outcome.authenticated.session;

    let body = Json(RefreshResponse {
        user: UserDto::from(&outcome.authenticated.user),
        session: SessionDto::from(session),
        refreshed: outcome.refreshed,
        rotated: outcome.rotated,
    });

    if outcome.rotated {
        let cookie = session_cookie(&state.facade, session);
        return Ok(([(header::SET_COOKIE, cookie)], body).into_response());
    }

    Ok(body.into_response())
}

// ============================================================================
// Passwords
// ============================================================================

/// POST /api/auth/password/forgot
pub async fn forgot_password<P, R>(
    State(state): State<AuthAppState<P, R>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    P: IdentityProvider + Send + Sync + 'static,
    R: AccessResolver + Send + Sync + 'static,
{
    state
        .facade
        .request_password_reset(&req.email, req.redirect_to.as_deref())
        .await?;

    // Same wording whether or not the account exists
    Ok(Json(MessageResponse::ok(
        "If the email exists, a password reset link has been sent",
    )))
}

/// POST /api/auth/password/reset
pub async fn reset_password<P, R>(
    State(state): State<AuthAppState<P, R>>,
    Json(req): Json<ResetPasswordRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    P: IdentityProvider + Send + Sync + 'static,
    R: AccessResolver + Send + Sync + 'static,
{
    state
        .facade
        .reset_password(&req.token, &req.new_password)
        .await?;

    Ok(Json(MessageResponse::ok("Password has been reset successfully")))
}

/// POST /api/auth/password/change
pub async fn change_password<P, R>(
    State(state): State<AuthAppState<P, R>>,
    headers: HeaderMap,
    Json(req): Json<ChangePasswordRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    P: IdentityProvider + Send + Sync + 'static,
    R: AccessResolver + Send + Sync + 'static,
{
    let token = request_token(&state.facade, &headers);
    let input = ChangePasswordInput {
        current_password: req.current_password,
        new_password: req.new_password,
        revoke_other_sessions: req.revoke_other_sessions,
    };

    state.facade.change_password(token.as_deref(), input).await?;

    Ok(Json(MessageResponse::ok("Password has been changed successfully")))
}

// ============================================================================
// Me
// ============================================================================

/// GET /api/auth/me (guarded)
pub async fn me(ctx: AuthContext) -> Json<MeResponse> {
    Json(MeResponse::new(&ctx.principal, ctx.fresh))
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Session cookie first, bearer header second
pub(crate) fn request_token<P, R>(facade: &AuthFacade<P, R>, headers: &HeaderMap) -> Option<String>
where
    P: IdentityProvider,
    R: AccessResolver,
{
    extract_session_token(headers, &facade.config().session_cookie_name)
}

fn session_cookie<P, R>(facade: &AuthFacade<P, R>, session: &Session) -> header::HeaderValue
where
    P: IdentityProvider,
    R: AccessResolver,
{
    let max_age = session.remaining(facade.now()).num_seconds();
    let cookie = facade
        .config()
        .cookie_config()
        .build_set_cookie(session.token.as_str(), Some(max_age));
    set_cookie_header(&cookie)
}

/// Parse a JSON body that may be absent
fn optional_json<T>(body: &Bytes) -> AuthResult<T>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::from(e).into())
}
