//! Password recovery and rotation.
//!
//! Reset tokens are single use: the store keeps only a SHA-256 digest and
//! the consume step clears it, bumps the password-changed watermark, and
//! empties the active refresh set in one statement. Every path that changes
//! a password ends with a fresh session for the caller.

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
    principal::require_auth,
    register::MIN_PASSWORD_LENGTH,
    session::issue_session,
    state::AuthState,
    storage,
    types::{
        AuthResponse, ChangePasswordRequest, ForgotPasswordRequest, ForgotPasswordResponse,
        ResetPasswordRequest,
    },
    utils::{generate_reset_token, hash_password, hash_reset_token, normalize_email,
        verify_password},
};

#[utoipa::path(
    post,
    path = "/v1/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset token issued", body = ForgotPasswordResponse),
        (status = 404, description = "No account with that email")
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Response {
    let email = normalize_email(&payload.email);

    let principal = match storage::lookup_login(&pool, &email).await {
        Ok(Some((principal, _))) => principal,
        Ok(None) => {
            return fail(
                StatusCode::NOT_FOUND,
                "There is no user with that email address",
            )
        }
        Err(err) => return AuthFailure::Internal(err).into_response(),
    };

    let token = generate_reset_token();
    let token_hash = hash_reset_token(&token);
    if let Err(err) = storage::store_reset_token(
        &pool,
        principal.user_id,
        &token_hash,
        auth_state.config().reset_token_ttl_seconds(),
    )
    .await
    {
        return AuthFailure::Internal(err).into_response();
    }

    // No delivery channel on this surface; the raw token goes back to the
    // caller and only its digest was stored.
    let body = ForgotPasswordResponse {
        status: "success".to_string(),
        message: "Reset token generated".to_string(),
        reset_token: token,
    };
    (StatusCode::OK, Json(body)).into_response()
}

#[utoipa::path(
    post,
    path = "/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset, session established", body = AuthResponse),
        (status = 400, description = "Reset token unknown, expired, or password too short")
    ),
    tag = "auth"
)]
pub async fn reset_password(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Response {
    if payload.password.len() < MIN_PASSWORD_LENGTH {
        return fail(
            StatusCode::BAD_REQUEST,
            "Password must be at least 8 characters long",
        );
    }

    let password_hash = match hash_password(&payload.password) {
        Ok(hash) => hash,
        Err(err) => return AuthFailure::Internal(err).into_response(),
    };

    let token_hash = hash_reset_token(payload.token.trim());
    let principal = match storage::consume_reset_token(&pool, &token_hash, &password_hash).await {
        Ok(Some(principal)) => principal,
        Ok(None) => return AuthFailure::ResetTokenInvalidOrExpired.into_response(),
        Err(err) => return AuthFailure::Internal(err).into_response(),
    };

    issue_session(
        &pool,
        &auth_state,
        principal,
        false,
        StatusCode::OK,
        "Password reset successful",
    )
    .await
}

#[utoipa::path(
    post,
    path = "/v1/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed, fresh session established", body = AuthResponse),
        (status = 400, description = "Current password wrong or new password too short"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "auth"
)]
pub async fn change_password(
    headers: axum::http::HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Response {
    let principal = match require_auth(&headers, &pool, &auth_state).await {
        Ok(principal) => principal,
        Err(failure) => return failure.into_response(),
    };

    if payload.password.len() < MIN_PASSWORD_LENGTH {
        return fail(
            StatusCode::BAD_REQUEST,
            "Password must be at least 8 characters long",
        );
    }

    let current_hash = match storage::lookup_password_hash(&pool, principal.user_id).await {
        Ok(Some(hash)) => hash,
        Ok(None) => return AuthFailure::PrincipalNotFound.into_response(),
        Err(err) => return AuthFailure::Internal(err).into_response(),
    };

    if !verify_password(&payload.current_password, &current_hash) {
        return fail(StatusCode::BAD_REQUEST, "Your current password is incorrect");
    }

    let new_hash = match hash_password(&payload.password) {
        Ok(hash) => hash,
        Err(err) => return AuthFailure::Internal(err).into_response(),
    };

    // Bumps the watermark and clears the active set, invalidating every
    // token issued before this instant.
    if let Err(err) = storage::update_password(&pool, principal.user_id, &new_hash).await {
        return AuthFailure::Internal(err).into_response();
    }

    issue_session(
        &pool,
        &auth_state,
        principal,
        false,
        StatusCode::OK,
        "Password changed successfully",
    )
    .await
}
