//! Database helpers for accounts, the active refresh set, and the
//! revocation ledger.
//!
//! The active refresh set lives as a `TEXT[]` column on the owner's row.
//! Every mutation is a single statement so concurrent rotations of the same
//! token serialize on the row and exactly one of them observes the old value.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::principal::{Principal, Role};
use super::utils::is_unique_violation;

const PRINCIPAL_COLUMNS: &str = "id, email, first_name, last_name, role, is_active, \
     password_changed_at, last_login_at, created_at";

/// Outcome when attempting to create a new account.
#[derive(Debug)]
pub(super) enum SignupOutcome {
    Created(Principal),
    Conflict,
}

/// Outcome of a profile update.
#[derive(Debug)]
pub(crate) enum ProfileOutcome {
    Updated(Principal),
    EmailTaken,
    NotFound,
}

fn principal_from_row(row: &PgRow) -> Result<Principal> {
    let role: String = row.get("role");
    let role = Role::parse(&role).ok_or_else(|| anyhow!("unknown role in store: {role}"))?;

    Ok(Principal {
        user_id: row.get("id"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        role,
        is_active: row.get("is_active"),
        password_changed_at: row.get("password_changed_at"),
        last_login_at: row.get("last_login_at"),
        created_at: row.get("created_at"),
    })
}

pub(crate) async fn lookup_principal(pool: &PgPool, user_id: Uuid) -> Result<Option<Principal>> {
    let query = &format!("SELECT {PRINCIPAL_COLUMNS} FROM users WHERE id = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup principal")?;

    row.as_ref().map(principal_from_row).transpose()
}

/// Look up an account by email for the login exchange. Returns the principal
/// together with its stored password hash.
pub(super) async fn lookup_login(
    pool: &PgPool,
    email: &str,
) -> Result<Option<(Principal, String)>> {
    let query = &format!("SELECT {PRINCIPAL_COLUMNS}, password_hash FROM users WHERE email = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup login record")?;

    row.map(|row| {
        let principal = principal_from_row(&row)?;
        let password_hash: String = row.get("password_hash");
        Ok((principal, password_hash))
    })
    .transpose()
}

pub(super) async fn lookup_password_hash(pool: &PgPool, user_id: Uuid) -> Result<Option<String>> {
    let query = "SELECT password_hash FROM users WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup password hash")?;

    Ok(row.map(|row| row.get("password_hash")))
}

pub(super) async fn insert_user(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
    first_name: &str,
    last_name: &str,
) -> Result<SignupOutcome> {
    let query = &format!(
        "INSERT INTO users (email, password_hash, first_name, last_name) \
         VALUES ($1, $2, $3, $4) \
         RETURNING {PRINCIPAL_COLUMNS}"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(password_hash)
        .bind(first_name)
        .bind(last_name)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(SignupOutcome::Created(principal_from_row(&row)?)),
        Err(err) if is_unique_violation(&err) => Ok(SignupOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

/// Append a refresh token to the owner's active set and stamp the login.
/// The slice keeps only the newest `max - 1` entries before the append, so
/// the set never grows past `max` and the oldest session is evicted first.
/// Returns the login instant the statement wrote.
pub(super) async fn push_refresh_token(
    pool: &PgPool,
    user_id: Uuid,
    token: &str,
    max: i32,
) -> Result<DateTime<Utc>> {
    let query = "UPDATE users \
         SET refresh_tokens = array_append( \
                 (refresh_tokens)[GREATEST(COALESCE(array_length(refresh_tokens, 1), 0) - $3 + 2, 1):], \
                 $2), \
             last_login_at = NOW(), \
             updated_at = NOW() \
         WHERE id = $1 \
         RETURNING last_login_at";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(token)
        .bind(max)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to store refresh token")?;

    Ok(row.get("last_login_at"))
}

/// Atomically replace `old_token` with `new_token` in the owner's active
/// set. Returns `false` when the old token was not present, which is the
/// consumed-exactly-once signal under concurrent rotation.
pub(super) async fn swap_refresh_token(
    pool: &PgPool,
    user_id: Uuid,
    old_token: &str,
    new_token: &str,
) -> Result<bool> {
    let query = "UPDATE users \
         SET refresh_tokens = array_append(array_remove(refresh_tokens, $2), $3), \
             updated_at = NOW() \
         WHERE id = $1 AND $2 = ANY(refresh_tokens)";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .bind(old_token)
        .bind(new_token)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to rotate refresh token")?;

    Ok(result.rows_affected() == 1)
}

/// Remove a refresh token from whichever account holds it. Returns the
/// owner's id when the token was present.
pub(super) async fn remove_refresh_token(pool: &PgPool, token: &str) -> Result<Option<Uuid>> {
    let query = "UPDATE users \
         SET refresh_tokens = array_remove(refresh_tokens, $1), \
             updated_at = NOW() \
         WHERE $1 = ANY(refresh_tokens) \
         RETURNING id";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to remove refresh token")?;

    Ok(row.map(|row| row.get("id")))
}

pub(crate) async fn refresh_token_in_set(
    pool: &PgPool,
    user_id: Uuid,
    token: &str,
) -> Result<bool> {
    let query = "SELECT 1 FROM users WHERE id = $1 AND $2 = ANY(refresh_tokens)";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(token)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to check refresh token membership")?;

    Ok(row.is_some())
}

/// Insert a consumed refresh token into the revocation ledger. Idempotent:
/// re-inserting the same token is a no-op.
pub(super) async fn blacklist_refresh_token(
    pool: &PgPool,
    token: &str,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    let query = "INSERT INTO revoked_tokens (token, user_id, expires_at) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (token) DO NOTHING";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token)
        .bind(user_id)
        .bind(expires_at)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to blacklist refresh token")?;

    Ok(())
}

pub(crate) async fn is_refresh_token_blacklisted(pool: &PgPool, token: &str) -> Result<bool> {
    let query = "SELECT 1 FROM revoked_tokens WHERE token = $1 AND blacklisted";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to check revocation ledger")?;

    Ok(row.is_some())
}

/// Store a reset token digest, replacing any outstanding one.
pub(super) async fn store_reset_token(
    pool: &PgPool,
    user_id: Uuid,
    token_hash: &[u8],
    ttl_seconds: i64,
) -> Result<()> {
    let query = "UPDATE users \
         SET reset_token_hash = $2, \
             reset_token_expires_at = NOW() + $3 * INTERVAL '1 second', \
             updated_at = NOW() \
         WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(token_hash)
        .bind(ttl_seconds)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to store reset token")?;

    Ok(())
}

/// Consume a reset token and install the new password in one statement: the
/// digest match, expiry check, watermark bump, and token clear all happen
/// atomically. Also drops every active refresh token, forcing re-login
/// everywhere. Returns `None` when the token is unknown or expired.
pub(super) async fn consume_reset_token(
    pool: &PgPool,
    token_hash: &[u8],
    new_password_hash: &str,
) -> Result<Option<Principal>> {
    let query = &format!(
        "UPDATE users \
         SET password_hash = $2, \
             password_changed_at = NOW(), \
             reset_token_hash = NULL, \
             reset_token_expires_at = NULL, \
             refresh_tokens = '{{}}', \
             updated_at = NOW() \
         WHERE reset_token_hash = $1 AND reset_token_expires_at > NOW() \
         RETURNING {PRINCIPAL_COLUMNS}"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .bind(new_password_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to consume reset token")?;

    row.as_ref().map(principal_from_row).transpose()
}

/// Install a new password and bump the watermark. Existing refresh tokens
/// are dropped so every other session has to log in again.
pub(super) async fn update_password(
    pool: &PgPool,
    user_id: Uuid,
    new_password_hash: &str,
) -> Result<()> {
    let query = "UPDATE users \
         SET password_hash = $2, \
             password_changed_at = NOW(), \
             refresh_tokens = '{}', \
             updated_at = NOW() \
         WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(new_password_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update password")?;

    Ok(())
}

/// Patch profile fields. `COALESCE` keeps columns untouched when the caller
/// passes `None`.
pub(crate) async fn update_profile(
    pool: &PgPool,
    user_id: Uuid,
    first_name: Option<&str>,
    last_name: Option<&str>,
    email: Option<&str>,
) -> Result<ProfileOutcome> {
    let query = &format!(
        "UPDATE users \
         SET first_name = COALESCE($2, first_name), \
             last_name = COALESCE($3, last_name), \
             email = COALESCE($4, email), \
             updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {PRINCIPAL_COLUMNS}"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await;

    match row {
        Ok(Some(row)) => Ok(ProfileOutcome::Updated(principal_from_row(&row)?)),
        Ok(None) => Ok(ProfileOutcome::NotFound),
        Err(err) if is_unique_violation(&err) => Ok(ProfileOutcome::EmailTaken),
        Err(err) => Err(err).context("failed to update profile"),
    }
}

/// Filters for the admin account listing.
#[derive(Debug)]
pub(crate) struct UserFilter<'a> {
    pub(crate) role: Option<&'a str>,
    pub(crate) is_active: Option<bool>,
    pub(crate) limit: i64,
    pub(crate) offset: i64,
}

/// Page through accounts, newest first. Returns the page plus the total
/// count under the same filter.
pub(crate) async fn list_users(
    pool: &PgPool,
    filter: &UserFilter<'_>,
) -> Result<(Vec<Principal>, i64)> {
    let count_query = "SELECT COUNT(*) AS total FROM users \
         WHERE ($1::text IS NULL OR role = $1) \
           AND ($2::boolean IS NULL OR is_active = $2)";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = count_query
    );
    let total: i64 = sqlx::query(count_query)
        .bind(filter.role)
        .bind(filter.is_active)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to count users")?
        .get("total");

    let query = &format!(
        "SELECT {PRINCIPAL_COLUMNS} FROM users \
         WHERE ($1::text IS NULL OR role = $1) \
           AND ($2::boolean IS NULL OR is_active = $2) \
         ORDER BY created_at DESC \
         LIMIT $3 OFFSET $4"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let rows = sqlx::query(query)
        .bind(filter.role)
        .bind(filter.is_active)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list users")?;

    let users = rows
        .iter()
        .map(principal_from_row)
        .collect::<Result<Vec<_>>>()?;

    Ok((users, total))
}

pub(crate) async fn set_user_role(
    pool: &PgPool,
    user_id: Uuid,
    role: Role,
) -> Result<Option<Principal>> {
    let query = &format!(
        "UPDATE users \
         SET role = $2, updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {PRINCIPAL_COLUMNS}"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(role.as_str())
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to update user role")?;

    row.as_ref().map(principal_from_row).transpose()
}

/// Flip the active flag. Deactivation also clears the active refresh set so
/// outstanding sessions cannot rotate any further.
pub(crate) async fn toggle_user_status(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<Principal>> {
    let query = &format!(
        "UPDATE users \
         SET is_active = NOT is_active, \
             refresh_tokens = CASE WHEN is_active THEN '{{}}' ELSE refresh_tokens END, \
             updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {PRINCIPAL_COLUMNS}"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to toggle user status")?;

    row.as_ref().map(principal_from_row).transpose()
}

/// Soft delete. The row survives so the revocation ledger and audit trail
/// keep their foreign keys; guards reject the account from now on.
pub(crate) async fn deactivate_user(pool: &PgPool, user_id: Uuid) -> Result<bool> {
    let query = "UPDATE users \
         SET is_active = FALSE, \
             refresh_tokens = '{}', \
             updated_at = NOW() \
         WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to deactivate user")?;

    Ok(result.rows_affected() == 1)
}
