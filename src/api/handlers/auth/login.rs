//! Credential exchange.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;

use super::{
    error::AuthFailure,
    session::issue_session,
    state::AuthState,
    storage,
    types::{AuthResponse, LoginRequest},
    utils::{normalize_email, verify_password},
};

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted, session established", body = AuthResponse),
        (status = 401, description = "Unknown email, wrong password, or deactivated account")
    ),
    tag = "auth"
)]
pub async fn login(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(payload): Json<LoginRequest>,
) -> Response {
    let email = normalize_email(&payload.email);

    let (principal, password_hash) = match storage::lookup_login(&pool, &email).await {
        // Unknown email and wrong password are the same failure, so the
        // endpoint cannot be used to probe for accounts.
        Ok(Some(record)) => record,
        Ok(None) => return AuthFailure::InvalidCredentials.into_response(),
        Err(err) => return AuthFailure::Internal(err).into_response(),
    };

    if !verify_password(&payload.password, &password_hash) {
        return AuthFailure::InvalidCredentials.into_response();
    }

    // Checked only after the password so a guessing attacker cannot tell a
    // deactivated account from a wrong password.
    if !principal.is_active {
        return AuthFailure::AccountInactive.into_response();
    }

    issue_session(
        &pool,
        &auth_state,
        principal,
        payload.remember_me,
        StatusCode::OK,
        "Authentication successful",
    )
    .await
}
