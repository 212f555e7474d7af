//! Login route handler.

use axum::{Json, extract::State};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::extract::AppJson;
use crate::error::Result;
use crate::state::AppState;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: SecretString,
}

/// Login response body.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
}

/// Exchange a username and password for an access token.
///
/// POST /login
///
/// # Errors
///
/// Returns 401 "Invalid credentials" for an unknown user or wrong password.
pub async fn login(
    State(state): State<AppState>,
    AppJson(request): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let access_token = state
        .auth()
        .login(&request.username, request.password.expose_secret())
        .await?;

    Ok(Json(LoginResponse { access_token }))
}
