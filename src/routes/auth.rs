//! Auth routes: password sign-in, session cookie, admin check.

use axum::extract::{FromRef, FromRequestParts, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use time::Duration;
use uuid::Uuid;

use crate::error::ApiError;
use crate::services::{auth as auth_svc, session};
use crate::state::AppState;

pub(crate) const COOKIE_NAME: &str = "session_token";

fn session_token(jar: &CookieJar) -> Option<&str> {
    jar.get(COOKIE_NAME).map(Cookie::value).filter(|token| !token.is_empty())
}

/// Session cookie valid for `ttl_hours`.
pub(crate) fn session_cookie(token: String, secure: bool, ttl_hours: i64) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::hours(ttl_hours))
        .build()
}

pub(crate) fn cleared_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::ZERO)
        .build()
}

// =============================================================================
// AUTH EXTRACTORS
// =============================================================================

/// Authenticated user extracted from the session cookie.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: session::SessionUser,
    pub token: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(token) = session_token(&jar) else {
            return Err(ApiError::unauthorized());
        };

        let app_state = AppState::from_ref(state);
        let user = session::validate_session(&app_state.pool, token)
            .await?
            .ok_or_else(ApiError::unauthorized)?;

        Ok(Self { user, token: token.to_owned() })
    }
}

/// Authenticated administrator. Signed-in non-admins get 403.
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<S> for AdminUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        if !auth.user.is_admin {
            tracing::warn!(user_id = %auth.user.id, "admin route refused");
            return Err(ApiError::forbidden());
        }
        Ok(Self(auth))
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub is_admin: bool,
    /// Echoed for non-browser clients that send the cookie themselves.
    pub token: String,
}

/// `POST /api/auth/login`: verify credentials, set the session cookie.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginBody>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth_svc::sign_in(&state.pool, &body.email, &body.password).await?;
    let is_admin = auth_svc::is_admin(&state.pool, user_id).await?;
    let token = session::create_session(&state.pool, user_id, state.config.session_ttl_hours).await?;
    tracing::info!(%user_id, is_admin, "signed in");

    let cookie = session_cookie(
        token.clone(),
        state.config.cookie_secure.unwrap_or(false),
        state.config.session_ttl_hours,
    );
    Ok((jar.add(cookie), Json(LoginResponse { user_id, is_admin, token })))
}

/// `GET /api/auth/me`: return current user.
pub async fn me(auth: AuthUser) -> Json<session::SessionUser> {
    Json(auth.user)
}

/// `POST /api/auth/logout`: delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    if let Err(e) = session::delete_session(&state.pool, &auth.token).await {
        tracing::warn!(error = %e, "session delete failed during logout");
    }

    let jar = CookieJar::new().add(cleared_cookie(state.config.cookie_secure.unwrap_or(false)));
    (jar, StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct AdminCheck {
    pub is_admin: bool,
}

/// `GET /api/auth/is-admin`: `false` for anonymous or expired sessions.
pub async fn is_admin(State(state): State<AppState>, jar: CookieJar) -> Result<Json<AdminCheck>, ApiError> {
    let Some(token) = session_token(&jar) else {
        return Ok(Json(AdminCheck { is_admin: false }));
    };
    let user = session::validate_session(&state.pool, token).await?;
    Ok(Json(AdminCheck { is_admin: user.is_some_and(|u| u.is_admin) }))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
