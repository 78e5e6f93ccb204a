//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use schoolhub_core::accounts::ensure_active;
use schoolhub_core::{Actor, PortError, Role};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;

/// The authenticated caller, inserted into request extensions by `require_auth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    /// Fails with 403 unless the caller has one of `roles`.
    pub fn require(&self, roles: &[Role]) -> Result<(), ApiError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(PortError::Forbidden(format!(
                "This action is not available to the {} role",
                self.role
            ))
            .into())
        }
    }

    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id,
            role: self.role,
        }
    }
}

/// Pulls the `session` token out of the Cookie header.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|token| !token.is_empty())
}

/// Middleware that validates the auth session cookie and loads the caller.
///
/// If valid, inserts an `AuthUser` into request extensions for handlers to use.
/// A missing or unknown session is 401; an account that is not approved is 403.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Parse session ID from cookie
    let token = session_token(req.headers()).ok_or(PortError::Unauthorized)?;

    // 2. Resolve the session to its user
    let user = state.accounts.resolve_session(token).await?;
    ensure_active(&user)?;

    // 3. Insert the caller into request extensions
    req.extensions_mut().insert(AuthUser {
        id: user.id,
        role: user.role,
    });

    // 4. Continue to the handler
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn session_token_is_read_from_the_cookie_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; session=abc123"));
        assert_eq!(session_token(&headers), Some("abc123"));

        headers.insert(header::COOKIE, HeaderValue::from_static("session="));
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn role_guard() {
        let teacher = AuthUser {
            id: Uuid::new_v4(),
            role: Role::Teacher,
        };
        assert!(teacher.require(&[Role::Teacher, Role::Admin]).is_ok());
        assert!(teacher.require(&[Role::Admin]).is_err());
    }
}
