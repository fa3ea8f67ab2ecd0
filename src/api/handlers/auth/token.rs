//! Signed access/refresh token issuance and verification.
//!
//! The issuer is pure: it mints a pair from signing keys and a clock and
//! never touches the store. Callers are responsible for persisting the
//! refresh token into the owner's active set.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::principal::Role;

/// Claims carried by a short-lived access token.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct AccessClaims {
    pub(crate) sub: Uuid,
    pub(crate) role: Role,
    pub(crate) iat: i64,
    pub(crate) exp: i64,
}

/// Claims carried by a refresh token. Role is resolved from the store at
/// rotation time, so it is deliberately not embedded here.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct RefreshClaims {
    pub(crate) sub: Uuid,
    pub(crate) iat: i64,
    pub(crate) exp: i64,
}

/// Why a presented token failed cryptographic verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenError {
    /// Signature or structure is invalid, or the token was signed for the
    /// other scope (access vs refresh).
    Malformed,
    /// Signature is valid but the signed `exp` claim has passed.
    Expired,
}

/// A freshly minted access/refresh pair.
#[derive(Debug)]
pub(crate) struct TokenPair {
    pub(crate) access_token: String,
    pub(crate) refresh_token: String,
    pub(crate) access_expires_at: DateTime<Utc>,
    pub(crate) refresh_expires_at: DateTime<Utc>,
}

/// HS256 signing material, one secret per token scope.
pub struct TokenKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl TokenKeys {
    #[must_use]
    pub fn from_secrets(access_secret: &SecretString, refresh_secret: &SecretString) -> Self {
        let access = access_secret.expose_secret().as_bytes();
        let refresh = refresh_secret.expose_secret().as_bytes();
        Self {
            access_encoding: EncodingKey::from_secret(access),
            access_decoding: DecodingKey::from_secret(access),
            refresh_encoding: EncodingKey::from_secret(refresh),
            refresh_decoding: DecodingKey::from_secret(refresh),
        }
    }

    /// Mint a new access/refresh pair for a principal.
    pub(crate) fn issue_pair(
        &self,
        user_id: Uuid,
        role: Role,
        access_ttl_seconds: i64,
        refresh_ttl_seconds: i64,
        now: DateTime<Utc>,
    ) -> Result<TokenPair> {
        let iat = now.timestamp();
        let access_exp = iat + access_ttl_seconds;
        let refresh_exp = iat + refresh_ttl_seconds;

        let access_claims = AccessClaims {
            sub: user_id,
            role,
            iat,
            exp: access_exp,
        };
        let refresh_claims = RefreshClaims {
            sub: user_id,
            iat,
            exp: refresh_exp,
        };

        let header = Header::new(Algorithm::HS256);
        let access_token = encode(&header, &access_claims, &self.access_encoding)
            .context("failed to sign access token")?;
        let refresh_token = encode(&header, &refresh_claims, &self.refresh_encoding)
            .context("failed to sign refresh token")?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at: datetime_from_unix(access_exp)?,
            refresh_expires_at: datetime_from_unix(refresh_exp)?,
        })
    }

    /// Verify an access token's signature, then its expiry against `now`.
    pub(crate) fn decode_access(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessClaims, TokenError> {
        let data = decode::<AccessClaims>(token, &self.access_decoding, &relaxed_validation())
            .map_err(|_| TokenError::Malformed)?;
        if data.claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(data.claims)
    }

    /// Verify a refresh token's signature, then its expiry against `now`.
    pub(crate) fn decode_refresh(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshClaims, TokenError> {
        let data = decode::<RefreshClaims>(token, &self.refresh_decoding, &relaxed_validation())
            .map_err(|_| TokenError::Malformed)?;
        if data.claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(data.claims)
    }
}

/// Expiry is checked manually against a caller-supplied clock, so the
/// library's wall-clock validation is disabled.
fn relaxed_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation
}

fn datetime_from_unix(seconds: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
        .with_context(|| format!("token expiry out of range: {seconds}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::Duration;

    fn test_keys() -> TokenKeys {
        TokenKeys::from_secrets(&"access-secret".into(), &"refresh-secret".into())
    }

    #[test]
    fn issue_pair_round_trips() -> Result<()> {
        let keys = test_keys();
        let now = Utc::now();
        let user_id = Uuid::new_v4();

        let pair = keys.issue_pair(user_id, Role::Admin, 900, 7 * 24 * 60 * 60, now)?;

        let access = keys
            .decode_access(&pair.access_token, now)
            .map_err(|err| anyhow::anyhow!("access decode failed: {err:?}"))?;
        assert_eq!(access.sub, user_id);
        assert_eq!(access.role, Role::Admin);
        assert_eq!(access.exp - access.iat, 900);

        let refresh = keys
            .decode_refresh(&pair.refresh_token, now)
            .map_err(|err| anyhow::anyhow!("refresh decode failed: {err:?}"))?;
        assert_eq!(refresh.sub, user_id);
        assert_eq!(refresh.exp - refresh.iat, 7 * 24 * 60 * 60);
        Ok(())
    }

    #[test]
    fn issue_pair_reports_expiry_instants() -> Result<()> {
        let keys = test_keys();
        let now = Utc::now();

        let pair = keys.issue_pair(Uuid::new_v4(), Role::User, 900, 604_800, now)?;

        assert_eq!(
            pair.access_expires_at.timestamp(),
            now.timestamp() + 15 * 60
        );
        assert_eq!(
            pair.refresh_expires_at.timestamp(),
            now.timestamp() + 7 * 24 * 60 * 60
        );
        Ok(())
    }

    #[test]
    fn decode_access_rejects_expired_token() -> Result<()> {
        let keys = test_keys();
        let issued_at = Utc::now();
        let pair = keys.issue_pair(Uuid::new_v4(), Role::User, 900, 604_800, issued_at)?;

        let just_before = issued_at + Duration::seconds(899);
        assert!(keys.decode_access(&pair.access_token, just_before).is_ok());

        let just_after = issued_at + Duration::seconds(901);
        assert_eq!(
            keys.decode_access(&pair.access_token, just_after),
            Err(TokenError::Expired)
        );
        Ok(())
    }

    #[test]
    fn decode_rejects_cross_scope_tokens() -> Result<()> {
        // An access token must never verify under the refresh key and vice
        // versa, even though both are HS256.
        let keys = test_keys();
        let now = Utc::now();
        let pair = keys.issue_pair(Uuid::new_v4(), Role::User, 900, 604_800, now)?;

        assert_eq!(
            keys.decode_refresh(&pair.access_token, now),
            Err(TokenError::Malformed)
        );
        assert_eq!(
            keys.decode_access(&pair.refresh_token, now),
            Err(TokenError::Malformed)
        );
        Ok(())
    }

    #[test]
    fn decode_rejects_tampered_token() -> Result<()> {
        let keys = test_keys();
        let now = Utc::now();
        let pair = keys.issue_pair(Uuid::new_v4(), Role::User, 900, 604_800, now)?;

        let mut tampered = pair.access_token.clone();
        tampered.pop();
        tampered.push('A');
        assert_eq!(
            keys.decode_access(&tampered, now),
            Err(TokenError::Malformed)
        );
        Ok(())
    }

    #[test]
    fn decode_rejects_other_signing_secret() -> Result<()> {
        let keys = test_keys();
        let other = TokenKeys::from_secrets(&"other".into(), &"other".into());
        let now = Utc::now();
        let pair = keys.issue_pair(Uuid::new_v4(), Role::User, 900, 604_800, now)?;

        assert_eq!(
            other.decode_access(&pair.access_token, now),
            Err(TokenError::Malformed)
        );
        Ok(())
    }
}
