//! Self-service profile endpoints. All of them ride behind the bearer
//! guard; the admin surface lives in [`super::users`].

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;

use super::auth::{
    error::{fail, AuthFailure},
    principal::require_auth,
    storage::{self, ProfileOutcome},
    types::{UpdateProfileRequest, UserBody, UserData, UserResponse},
    utils::{normalize_email, valid_email},
    AuthState,
};

#[utoipa::path(
    get,
    path = "/v1/auth/me",
    responses(
        (status = 200, description = "Authenticated principal", body = UserResponse),
        (status = 401, description = "Not authenticated")
    ),
    tag = "auth"
)]
pub async fn get_me(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    let principal = match require_auth(&headers, &pool, &auth_state).await {
        Ok(principal) => principal,
        Err(failure) => return failure.into_response(),
    };

    let body = UserResponse {
        status: "success".to_string(),
        data: UserData {
            user: UserBody::from(&principal),
        },
    };
    (StatusCode::OK, Json(body)).into_response()
}

#[utoipa::path(
    patch,
    path = "/v1/auth/update-me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Nothing to update or email already in use"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "auth"
)]
pub async fn update_me(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Response {
    let principal = match require_auth(&headers, &pool, &auth_state).await {
        Ok(principal) => principal,
        Err(failure) => return failure.into_response(),
    };

    let first_name = payload
        .first_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());
    let last_name = payload
        .last_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let email = match payload.email.as_deref() {
        Some(raw) => {
            let normalized = normalize_email(raw);
            if !valid_email(&normalized) {
                return fail(StatusCode::BAD_REQUEST, "Please provide a valid email address");
            }
            Some(normalized)
        }
        None => None,
    };

    if first_name.is_none() && last_name.is_none() && email.is_none() {
        return fail(StatusCode::BAD_REQUEST, "No updates provided");
    }

    match storage::update_profile(
        &pool,
        principal.user_id,
        first_name,
        last_name,
        email.as_deref(),
    )
    .await
    {
        Ok(ProfileOutcome::Updated(updated)) => {
            let body = UserResponse {
                status: "success".to_string(),
                data: UserData {
                    user: UserBody::from(&updated),
                },
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Ok(ProfileOutcome::EmailTaken) => fail(StatusCode::BAD_REQUEST, "Email already in use"),
        Ok(ProfileOutcome::NotFound) => AuthFailure::PrincipalNotFound.into_response(),
        Err(err) => AuthFailure::Internal(err).into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/auth/delete-me",
    responses(
        (status = 204, description = "Account deactivated"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "auth"
)]
pub async fn delete_me(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    let principal = match require_auth(&headers, &pool, &auth_state).await {
        Ok(principal) => principal,
        Err(failure) => return failure.into_response(),
    };

    match storage::deactivate_user(&pool, principal.user_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => AuthFailure::PrincipalNotFound.into_response(),
        Err(err) => AuthFailure::Internal(err).into_response(),
    }
}
