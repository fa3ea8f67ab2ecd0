//! Account creation. A successful registration logs the account in
//! immediately: same envelope and cookies as login, with a 201.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;

use super::{
    error::{fail, AuthFailure},
    session::issue_session,
    state::AuthState,
    storage::{self, SignupOutcome},
    types::{AuthResponse, RegisterRequest},
    utils::{hash_password, normalize_email, valid_email},
};

pub(super) const MIN_PASSWORD_LENGTH: usize = 8;

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created and logged in", body = AuthResponse),
        (status = 400, description = "Invalid input or email already registered")
    ),
    tag = "auth"
)]
pub async fn register(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(payload): Json<RegisterRequest>,
) -> Response {
    let email = normalize_email(&payload.email);
    if !valid_email(&email) {
        return fail(StatusCode::BAD_REQUEST, "Please provide a valid email address");
    }
    if payload.password.len() < MIN_PASSWORD_LENGTH {
        return fail(
            StatusCode::BAD_REQUEST,
            "Password must be at least 8 characters long",
        );
    }

    let first_name = payload.first_name.trim();
    let last_name = payload.last_name.trim();
    if first_name.is_empty() || last_name.is_empty() {
        return fail(StatusCode::BAD_REQUEST, "Please provide your first and last name");
    }

    let password_hash = match hash_password(&payload.password) {
        Ok(hash) => hash,
        Err(err) => return AuthFailure::Internal(err).into_response(),
    };

    // The unique index decides conflicts; no pre-check read.
    match storage::insert_user(&pool, &email, &password_hash, first_name, last_name).await {
        Ok(SignupOutcome::Created(principal)) => {
            issue_session(
                &pool,
                &auth_state,
                principal,
                false,
                StatusCode::CREATED,
                "Registration successful",
            )
            .await
        }
        Ok(SignupOutcome::Conflict) => fail(
            StatusCode::BAD_REQUEST,
            "User with this email already exists",
        ),
        Err(err) => AuthFailure::Internal(err).into_response(),
    }
}
