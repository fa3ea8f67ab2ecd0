//! Session issuance, rotation, and teardown.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::{
    error::AuthFailure,
    principal::{
        extract_cookie, require_refresh, Principal, ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME,
    },
    state::AuthState,
    storage,
    types::{AuthData, AuthResponse, MessageResponse, UserBody},
    utils::{auth_cookie, clear_auth_cookie},
};

/// Mint a pair for the principal, store the refresh token in the active
/// set, and build the response: both cookies plus the JSON envelope.
pub(super) async fn issue_session(
    pool: &PgPool,
    state: &AuthState,
    principal: Principal,
    remember_me: bool,
    status: StatusCode,
    message: &str,
) -> Response {
    let pair = match state.issue_pair(principal.user_id, principal.role, remember_me) {
        Ok(pair) => pair,
        Err(err) => return AuthFailure::Internal(err).into_response(),
    };

    let logged_in_at = match storage::push_refresh_token(
        pool,
        principal.user_id,
        &pair.refresh_token,
        state.config().max_active_refresh_tokens(),
    )
    .await
    {
        Ok(instant) => instant,
        Err(err) => return AuthFailure::Internal(err).into_response(),
    };

    let refresh_ttl = if remember_me {
        state.config().remember_me_ttl_seconds()
    } else {
        state.config().refresh_ttl_seconds()
    };

    let secure = state.config().cookie_secure();
    let mut headers = HeaderMap::new();
    match auth_cookie(
        ACCESS_COOKIE_NAME,
        &pair.access_token,
        state.config().access_ttl_seconds(),
        secure,
    )
    .and_then(|access| {
        auth_cookie(REFRESH_COOKIE_NAME, &pair.refresh_token, refresh_ttl, secure)
            .map(|refresh| (access, refresh))
    }) {
        Ok((access, refresh)) => {
            headers.append(SET_COOKIE, access);
            headers.append(SET_COOKIE, refresh);
        }
        Err(err) => return AuthFailure::Internal(err).into_response(),
    }

    // Report the login instant the push statement actually wrote.
    let mut principal = principal;
    principal.last_login_at = Some(logged_in_at);

    let body = AuthResponse {
        status: "success".to_string(),
        message: message.to_string(),
        data: AuthData {
            user: UserBody::from(&principal),
            access_token: pair.access_token,
            refresh_token: Some(pair.refresh_token),
            token_expiry: pair.access_expires_at,
        },
    };

    (status, headers, Json(body)).into_response()
}

#[utoipa::path(
    post,
    path = "/v1/auth/refresh-token",
    responses(
        (status = 200, description = "New token pair issued", body = AuthResponse),
        (status = 401, description = "Refresh token missing, invalid, expired, or already consumed")
    ),
    tag = "auth"
)]
pub async fn refresh_token(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let (principal, old_token) = match require_refresh(&headers, &pool, &auth_state).await {
        Ok(found) => found,
        Err(failure) => return failure.into_response(),
    };

    let pair = match auth_state.issue_pair(principal.user_id, principal.role, false) {
        Ok(pair) => pair,
        Err(err) => return AuthFailure::Internal(err).into_response(),
    };

    // Single-statement swap: under concurrent rotation of the same token,
    // exactly one request sees the old value and wins.
    match storage::swap_refresh_token(
        &pool,
        principal.user_id,
        &old_token,
        &pair.refresh_token,
    )
    .await
    {
        Ok(true) => {}
        Ok(false) => return AuthFailure::TokenReplayed.into_response(),
        Err(err) => return AuthFailure::Internal(err).into_response(),
    }

    // Ledger insert is best effort. The swap above already retired the old
    // token, so a failure here only loses defense in depth.
    if let Err(err) = blacklist_consumed_token(&pool, &auth_state, &principal, &old_token).await {
        error!("failed to blacklist rotated refresh token: {err:#}");
    }

    let secure = auth_state.config().cookie_secure();
    let mut response_headers = HeaderMap::new();
    match auth_cookie(
        ACCESS_COOKIE_NAME,
        &pair.access_token,
        auth_state.config().access_ttl_seconds(),
        secure,
    )
    .and_then(|access| {
        auth_cookie(
            REFRESH_COOKIE_NAME,
            &pair.refresh_token,
            auth_state.config().refresh_ttl_seconds(),
            secure,
        )
        .map(|refresh| (access, refresh))
    }) {
        Ok((access, refresh)) => {
            response_headers.append(SET_COOKIE, access);
            response_headers.append(SET_COOKIE, refresh);
        }
        Err(err) => return AuthFailure::Internal(err).into_response(),
    }

    let body = AuthResponse {
        status: "success".to_string(),
        message: "Token refreshed successfully".to_string(),
        data: AuthData {
            user: UserBody::from(&principal),
            access_token: pair.access_token,
            refresh_token: Some(pair.refresh_token),
            token_expiry: pair.access_expires_at,
        },
    };

    (StatusCode::OK, response_headers, Json(body)).into_response()
}

async fn blacklist_consumed_token(
    pool: &PgPool,
    state: &AuthState,
    principal: &Principal,
    token: &str,
) -> anyhow::Result<()> {
    // The token passed verification moments ago; decode again for its signed
    // expiry so the ledger row can be garbage collected on time.
    let Ok(claims) = state.keys().decode_refresh(token, Utc::now()) else {
        return Ok(());
    };
    let Some(expires_at) = chrono::DateTime::from_timestamp(claims.exp, 0) else {
        return Ok(());
    };
    storage::blacklist_refresh_token(pool, token, principal.user_id, expires_at).await
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 200, description = "Session cleared", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    // Best effort: an expired or unknown cookie still gets cleared below.
    if let Some(token) = extract_cookie(&headers, REFRESH_COOKIE_NAME) {
        match storage::remove_refresh_token(&pool, &token).await {
            Ok(Some(user_id)) => {
                if let Ok(claims) = auth_state.keys().decode_refresh(&token, Utc::now()) {
                    if let Some(expires_at) = chrono::DateTime::from_timestamp(claims.exp, 0) {
                        if let Err(err) =
                            storage::blacklist_refresh_token(&pool, &token, user_id, expires_at)
                                .await
                        {
                            error!("failed to blacklist refresh token on logout: {err:#}");
                        }
                    }
                }
            }
            Ok(None) => {}
            Err(err) => error!("failed to remove refresh token on logout: {err:#}"),
        }
    }

    let secure = auth_state.config().cookie_secure();
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_auth_cookie(ACCESS_COOKIE_NAME, secure) {
        response_headers.append(SET_COOKIE, cookie);
    }
    if let Ok(cookie) = clear_auth_cookie(REFRESH_COOKIE_NAME, secure) {
        response_headers.append(SET_COOKIE, cookie);
    }

    let body = MessageResponse {
        status: "success".to_string(),
        message: "Logged out successfully".to_string(),
    };

    (StatusCode::OK, response_headers, Json(body)).into_response()
}
