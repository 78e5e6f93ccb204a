//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, session checks and logout.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use schoolhub_core::accounts::ensure_active;
use schoolhub_core::PortError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};
use utoipa::ToSchema;

use crate::error::{ApiError, ErrorResponse};
use crate::web::middleware::session_token;
use crate::web::protocol::UserResponse;
use crate::web::state::AppState;

pub const MIN_PASSWORD_LEN: usize = 8;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Who the session belongs to.
#[derive(Serialize, Deserialize, Clone, Debug, ToSchema)]
pub struct SessionResponse {
    pub user: UserResponse,
}

//=========================================================================================
// Helpers
//=========================================================================================

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ApiError::Internal("Failed to hash password".to_string())
        })
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            error!("Failed to parse stored password hash: {:?}", e);
            false
        }
    }
}

fn session_cookie(token: &str, max_age_seconds: i64) -> String {
    format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        token, max_age_seconds
    )
}

const CLEARED_COOKIE: &str = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new account awaiting approval
#[utoipa::path(
    post,
    path = "/auth/signup",
    tag = "auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created; it must be approved before login", body = UserResponse),
        (status = 400, description = "Invalid email or password too short", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Validate and hash the password
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(PortError::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ))
        .into());
    }
    let password_hash = hash_password(&req.password)?;

    // 2. Create the account
    let user = state.accounts.register(&req.email, &password_hash).await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// POST /auth/login - Login with an approved account
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful; sets the session cookie", body = SessionResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 403, description = "Account pending approval or rejected", body = ErrorResponse)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Check the credentials and the approval state
    let user = state
        .accounts
        .authenticate(&req.email, |hash| verify_password(&req.password, hash))
        .await?;

    // 2. Open an auth session
    let session = state.accounts.open_session(user.id).await?;
    info!(user_id = %user.id, "User logged in");

    // 3. Return response with cookie
    let cookie = session_cookie(&session.id, state.accounts.session_ttl().num_seconds());
    let response = SessionResponse { user: user.into() };
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/session - Describe the session carried by the cookie
///
/// Repeated calls with the same token within a few seconds are answered from a
/// short-lived cache.
#[utoipa::path(
    post,
    path = "/auth/session",
    tag = "auth",
    responses(
        (status = 200, description = "The session is valid", body = SessionResponse),
        (status = 401, description = "No valid session", body = ErrorResponse),
        (status = 403, description = "Account pending approval or rejected", body = ErrorResponse)
    )
)]
pub async fn session_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, ApiError> {
    let token = session_token(&headers).ok_or(PortError::Unauthorized)?;

    if let Some(cached) = state.session_cache.get(token).await {
        debug!("Session check answered from cache");
        return Ok(Json(cached));
    }

    let user = state.accounts.resolve_session(token).await?;
    ensure_active(&user)?;

    let response = SessionResponse { user: user.into() };
    state.session_cache.insert(token, response.clone()).await;
    Ok(Json(response))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logout successful; clears the session cookie"),
        (status = 401, description = "No active session", body = ErrorResponse)
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Extract session cookie
    let token = session_token(&headers).ok_or(PortError::Unauthorized)?;

    // 2. Delete the auth session and forget any cached answer for it
    state.accounts.close_session(token).await?;
    state.session_cache.remove(token).await;

    // 3. Clear cookie
    Ok((StatusCode::OK, [(header::SET_COOKIE, CLEARED_COOKIE.to_string())]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_only_the_original_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
        assert!(!verify_password("correct horse", "not-a-phc-string"));
    }
}
