//! Authentication extractors.
//!
//! Handlers that need a caller take [`RequireAuth`] or [`RequireAdmin`] as an
//! argument. The extractor runs before the handler body, so a request with a
//! missing, invalid, or expired token never reaches it.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use emporium_core::Role;
use tracing::Span;

use crate::error::{AppError, set_sentry_user};
use crate::models::Identity;
use crate::services::{AuthError, require_role};
use crate::state::AppState;

/// Extractor that requires a valid bearer token.
///
/// # Example
///
/// ```rust,ignore
/// async fn my_orders(RequireAuth(identity): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", identity.username)
/// }
/// ```
pub struct RequireAuth(pub Identity);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AuthError::MissingToken)?;
        let identity = state.auth().authenticate(token)?;

        Span::current().record("username", identity.username.as_str());
        set_sentry_user(&identity.username);

        Ok(Self(identity))
    }
}

/// Extractor that requires a valid bearer token carrying the admin role.
///
/// Rejects with 401 for token problems and 403 for non-admin callers.
pub struct RequireAdmin(pub Identity);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(identity) = RequireAuth::from_request_parts(parts, state).await?;
        require_role(&identity, Role::Admin)?;
        Ok(Self(identity))
    }
}

/// The token from an `Authorization: Bearer <token>` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
