//! Failure taxonomy shared by the guard chain and the auth handlers.
//!
//! Every variant maps to a fixed status code and client-facing message.
//! Client errors serialize as `{"status": "fail", ...}`, internal errors as
//! `{"status": "error", ...}` with the cause logged but never leaked.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct FailureBody {
    pub(crate) status: String,
    pub(crate) message: String,
}

#[derive(Debug)]
pub(crate) enum AuthFailure {
    /// Unknown email or wrong password. Deliberately indistinguishable.
    InvalidCredentials,
    /// The account exists but has been deactivated.
    AccountInactive,
    /// No credential was presented where one is required.
    TokenMissing,
    /// The presented token failed signature or structural checks.
    TokenMalformed,
    /// The presented token is past its signed expiry.
    TokenExpired,
    /// The refresh token is blacklisted or no longer in the active set.
    TokenReplayed,
    /// The token predates the owner's password-changed watermark.
    PasswordStale,
    /// The token verified but its subject no longer exists.
    PrincipalNotFound,
    /// Authenticated, but the role does not grant this operation.
    RoleForbidden,
    /// The password reset token is unknown or past its expiry.
    ResetTokenInvalidOrExpired,
    Internal(anyhow::Error),
}

impl AuthFailure {
    const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials
            | Self::AccountInactive
            | Self::TokenMissing
            | Self::TokenMalformed
            | Self::TokenExpired
            | Self::TokenReplayed
            | Self::PasswordStale
            | Self::PrincipalNotFound => StatusCode::UNAUTHORIZED,
            Self::RoleForbidden => StatusCode::FORBIDDEN,
            Self::ResetTokenInvalidOrExpired => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn message(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "Incorrect email or password",
            Self::AccountInactive => {
                "Your account has been deactivated. Please contact support."
            }
            Self::TokenMissing => "You are not logged in! Please log in to get access.",
            Self::TokenMalformed => "Invalid token. Please log in again.",
            Self::TokenExpired => "Your token has expired. Please log in again.",
            Self::TokenReplayed => "Refresh token has been revoked. Please log in again.",
            Self::PasswordStale => "User recently changed password. Please log in again.",
            Self::PrincipalNotFound => "The user belonging to this token no longer exists.",
            Self::RoleForbidden => "You do not have permission to perform this action.",
            Self::ResetTokenInvalidOrExpired => "Token is invalid or has expired",
            Self::Internal(_) => "Something went wrong",
        }
    }
}

impl From<anyhow::Error> for AuthFailure {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        if let Self::Internal(err) = &self {
            error!("internal error: {err:#}");
        }

        let status = self.status();
        let body = FailureBody {
            status: if status.is_server_error() {
                "error".to_string()
            } else {
                "fail".to_string()
            },
            message: self.message().to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Handler-specific client error that is not part of the shared taxonomy,
/// e.g. a registration conflict.
pub(crate) fn fail(status: StatusCode, message: &str) -> Response {
    let body = FailureBody {
        status: "fail".to_string(),
        message: message.to_string(),
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AuthFailure::InvalidCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthFailure::TokenExpired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthFailure::RoleForbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthFailure::ResetTokenInvalidOrExpired.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthFailure::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_message_never_leaks_cause() {
        let failure = AuthFailure::Internal(anyhow::anyhow!("dsn contains password"));
        assert_eq!(failure.message(), "Something went wrong");
    }

    #[test]
    fn test_credential_failures_share_message_shape() {
        // Unknown email and wrong password must be indistinguishable.
        assert_eq!(
            AuthFailure::InvalidCredentials.message(),
            "Incorrect email or password"
        );
    }
}
