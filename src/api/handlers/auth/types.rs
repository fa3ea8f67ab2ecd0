//! Request and response bodies for the auth surface. All fields ride the
//! wire in camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::principal::Principal;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegisterRequest {
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) email: String,
    pub(crate) password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginRequest {
    pub(crate) email: String,
    pub(crate) password: String,
    #[serde(default)]
    pub(crate) remember_me: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ForgotPasswordRequest {
    pub(crate) email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResetPasswordRequest {
    pub(crate) token: String,
    pub(crate) password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChangePasswordRequest {
    pub(crate) current_password: String,
    pub(crate) password: String,
}

/// Password changes have their own endpoint, so an unexpected field here is
/// rejected by the extractor.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct UpdateProfileRequest {
    pub(crate) first_name: Option<String>,
    pub(crate) last_name: Option<String>,
    pub(crate) email: Option<String>,
}

/// Public view of an account. The password hash and reset fields never
/// leave the store.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserBody {
    pub(crate) id: String,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) email: String,
    pub(crate) role: String,
    pub(crate) is_active: bool,
    pub(crate) last_login: Option<DateTime<Utc>>,
    pub(crate) created_at: DateTime<Utc>,
}

impl From<&Principal> for UserBody {
    fn from(principal: &Principal) -> Self {
        Self {
            id: principal.user_id.to_string(),
            first_name: principal.first_name.clone(),
            last_name: principal.last_name.clone(),
            email: principal.email.clone(),
            role: principal.role.as_str().to_string(),
            is_active: principal.is_active,
            last_login: principal.last_login_at,
            created_at: principal.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuthData {
    pub(crate) user: UserBody,
    pub(crate) access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) refresh_token: Option<String>,
    pub(crate) token_expiry: DateTime<Utc>,
}

/// Envelope for every endpoint that establishes or renews a session.
#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct AuthResponse {
    pub(crate) status: String,
    pub(crate) message: String,
    pub(crate) data: AuthData,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct MessageResponse {
    pub(crate) status: String,
    pub(crate) message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct UserData {
    pub(crate) user: UserBody,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct UserResponse {
    pub(crate) status: String,
    pub(crate) data: UserData,
}

/// Delivery channels are out of scope, so the raw reset token is returned
/// to the caller directly.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ForgotPasswordResponse {
    pub(crate) status: String,
    pub(crate) message: String,
    pub(crate) reset_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    use crate::api::handlers::auth::principal::Role;

    fn sample_principal() -> Principal {
        Principal {
            user_id: Uuid::nil(),
            email: "user@example.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            role: Role::User,
            is_active: true,
            password_changed_at: None,
            last_login_at: None,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_user_body_serializes_camel_case() {
        let body = UserBody::from(&sample_principal());
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["firstName"], "Ada");
        assert_eq!(json["isActive"], true);
        assert_eq!(json["lastLogin"], serde_json::Value::Null);
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn test_auth_data_omits_absent_refresh_token() {
        let data = AuthData {
            user: UserBody::from(&sample_principal()),
            access_token: "tok".to_string(),
            refresh_token: None,
            token_expiry: Utc::now(),
        };
        let json = serde_json::to_value(&data).unwrap();
        assert!(json.get("refreshToken").is_none());
        assert_eq!(json["accessToken"], "tok");
    }

    #[test]
    fn test_login_request_remember_me_defaults_to_false() {
        let request: LoginRequest =
            serde_json::from_str(r#"{"email":"a@b.co","password":"pw"}"#).unwrap();
        assert!(!request.remember_me);

        let request: LoginRequest =
            serde_json::from_str(r#"{"email":"a@b.co","password":"pw","rememberMe":true}"#)
                .unwrap();
        assert!(request.remember_me);
    }

    #[test]
    fn test_update_profile_rejects_password_field() {
        let result = serde_json::from_str::<UpdateProfileRequest>(
            r#"{"firstName":"Ada","password":"sneaky"}"#,
        );
        assert!(result.is_err());
    }
}
