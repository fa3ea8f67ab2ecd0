//! Admin account management. Every endpoint sits behind the role guard,
//! which accepts a bearer header or the `accessToken` cookie.

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::auth::{
    error::{fail, AuthFailure},
    principal::{require_role, Principal, Role},
    storage::{self, UserFilter},
    types::{MessageResponse, UserBody, UserData, UserResponse},
    AuthState,
};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct ListUsersQuery {
    page: Option<i64>,
    limit: Option<i64>,
    role: Option<String>,
    #[serde(rename = "isActive")]
    is_active: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Pagination {
    current_page: i64,
    total_pages: i64,
    total_users: i64,
    has_next_page: bool,
    has_prev_page: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct UserListData {
    users: Vec<UserBody>,
    pagination: Pagination,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct UserListResponse {
    status: String,
    data: UserListData,
}

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct RoleUpdateRequest {
    role: String,
}

async fn require_admin(
    headers: &HeaderMap,
    pool: &PgPool,
    state: &AuthState,
) -> Result<Principal, AuthFailure> {
    require_role(headers, pool, state, &[Role::Admin]).await
}

fn parse_user_id(raw: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(raw).map_err(|_| fail(StatusCode::BAD_REQUEST, "Invalid user id"))
}

#[utoipa::path(
    get,
    path = "/v1/admin/users",
    params(
        ("page" = Option<i64>, Query, description = "1-based page number"),
        ("limit" = Option<i64>, Query, description = "Page size, capped at 100"),
        ("role" = Option<String>, Query, description = "Filter by role"),
        ("isActive" = Option<bool>, Query, description = "Filter by active flag")
    ),
    responses(
        (status = 200, description = "Paged account listing", body = UserListResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Caller is not an admin")
    ),
    tag = "admin"
)]
pub async fn list_users(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Query(query): Query<ListUsersQuery>,
) -> Response {
    if let Err(failure) = require_admin(&headers, &pool, &auth_state).await {
        return failure.into_response();
    }

    let role = match query.role.as_deref() {
        Some(raw) => match Role::parse(raw) {
            Some(role) => Some(role.as_str()),
            None => {
                return fail(
                    StatusCode::BAD_REQUEST,
                    "Invalid role. Must be either \"user\" or \"admin\"",
                )
            }
        },
        None => None,
    };

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let filter = UserFilter {
        role,
        is_active: query.is_active,
        limit,
        offset: (page - 1) * limit,
    };

    let (users, total) = match storage::list_users(&pool, &filter).await {
        Ok(found) => found,
        Err(err) => return AuthFailure::Internal(err).into_response(),
    };

    let total_pages = if total == 0 { 0 } else { (total + limit - 1) / limit };
    let body = UserListResponse {
        status: "success".to_string(),
        data: UserListData {
            users: users.iter().map(UserBody::from).collect(),
            pagination: Pagination {
                current_page: page,
                total_pages,
                total_users: total,
                has_next_page: page < total_pages,
                has_prev_page: page > 1,
            },
        },
    };
    (StatusCode::OK, Json(body)).into_response()
}

#[utoipa::path(
    get,
    path = "/v1/admin/users/{id}",
    params(("id" = String, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account found", body = UserResponse),
        (status = 404, description = "No account with that id"),
        (status = 403, description = "Caller is not an admin")
    ),
    tag = "admin"
)]
pub async fn get_user(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<String>,
) -> Response {
    if let Err(failure) = require_admin(&headers, &pool, &auth_state).await {
        return failure.into_response();
    }
    let user_id = match parse_user_id(&id) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    match storage::lookup_principal(&pool, user_id).await {
        Ok(Some(principal)) => {
            let body = UserResponse {
                status: "success".to_string(),
                data: UserData {
                    user: UserBody::from(&principal),
                },
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Ok(None) => fail(StatusCode::NOT_FOUND, "User not found"),
        Err(err) => AuthFailure::Internal(err).into_response(),
    }
}

#[utoipa::path(
    patch,
    path = "/v1/admin/users/{id}/role",
    params(("id" = String, Path, description = "Account id")),
    request_body = RoleUpdateRequest,
    responses(
        (status = 200, description = "Role updated", body = UserResponse),
        (status = 400, description = "Invalid role or self-targeted change"),
        (status = 404, description = "No account with that id")
    ),
    tag = "admin"
)]
pub async fn update_user_role(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<String>,
    Json(payload): Json<RoleUpdateRequest>,
) -> Response {
    let caller = match require_admin(&headers, &pool, &auth_state).await {
        Ok(caller) => caller,
        Err(failure) => return failure.into_response(),
    };
    let user_id = match parse_user_id(&id) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    let Some(role) = Role::parse(&payload.role) else {
        return fail(
            StatusCode::BAD_REQUEST,
            "Invalid role. Must be either \"user\" or \"admin\"",
        );
    };

    // Demoting yourself would lock the last admin out mid-session.
    if user_id == caller.user_id {
        return fail(StatusCode::BAD_REQUEST, "You cannot change your own role");
    }

    match storage::set_user_role(&pool, user_id, role).await {
        Ok(Some(updated)) => {
            let body = UserResponse {
                status: "success".to_string(),
                data: UserData {
                    user: UserBody::from(&updated),
                },
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Ok(None) => fail(StatusCode::NOT_FOUND, "User not found"),
        Err(err) => AuthFailure::Internal(err).into_response(),
    }
}

#[utoipa::path(
    patch,
    path = "/v1/admin/users/{id}/status",
    params(("id" = String, Path, description = "Account id")),
    responses(
        (status = 200, description = "Active flag toggled", body = UserResponse),
        (status = 400, description = "Self-targeted change"),
        (status = 404, description = "No account with that id")
    ),
    tag = "admin"
)]
pub async fn toggle_user_status(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<String>,
) -> Response {
    let caller = match require_admin(&headers, &pool, &auth_state).await {
        Ok(caller) => caller,
        Err(failure) => return failure.into_response(),
    };
    let user_id = match parse_user_id(&id) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    if user_id == caller.user_id {
        return fail(
            StatusCode::BAD_REQUEST,
            "You cannot deactivate your own account",
        );
    }

    match storage::toggle_user_status(&pool, user_id).await {
        Ok(Some(updated)) => {
            let body = UserResponse {
                status: "success".to_string(),
                data: UserData {
                    user: UserBody::from(&updated),
                },
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Ok(None) => fail(StatusCode::NOT_FOUND, "User not found"),
        Err(err) => AuthFailure::Internal(err).into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/admin/users/{id}",
    params(("id" = String, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account deactivated", body = MessageResponse),
        (status = 400, description = "Self-targeted delete"),
        (status = 404, description = "No account with that id")
    ),
    tag = "admin"
)]
pub async fn delete_user(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<String>,
) -> Response {
    let caller = match require_admin(&headers, &pool, &auth_state).await {
        Ok(caller) => caller,
        Err(failure) => return failure.into_response(),
    };
    let user_id = match parse_user_id(&id) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    if user_id == caller.user_id {
        return fail(StatusCode::BAD_REQUEST, "You cannot delete your own account");
    }

    match storage::deactivate_user(&pool, user_id).await {
        Ok(true) => {
            let body = MessageResponse {
                status: "success".to_string(),
                message: "User deactivated successfully".to_string(),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Ok(false) => fail(StatusCode::NOT_FOUND, "User not found"),
        Err(err) => AuthFailure::Internal(err).into_response(),
    }
}
