use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::http::HeaderValue;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use regex::Regex;
use sha2::{Digest, Sha256};

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Cheap shape check, not RFC validation. The unique index on the store is
/// the real arbiter.
pub(crate) fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

pub(crate) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("failed to hash password: {err}"))
}

pub(crate) fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash)
        .and_then(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed))
        .is_ok()
}

/// 32 bytes of CSPRNG output, url-safe encoded. The raw value goes to the
/// account owner, only its digest is stored.
pub(crate) fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) fn hash_reset_token(token: &str) -> Vec<u8> {
    Sha256::digest(token.as_bytes()).to_vec()
}

/// `HttpOnly` session cookie. Over an https frontend the pair must survive
/// cross-site requests, which requires `Secure; SameSite=None`.
pub(crate) fn auth_cookie(
    name: &str,
    value: &str,
    max_age_seconds: i64,
    secure: bool,
) -> Result<HeaderValue> {
    let attributes = if secure {
        "HttpOnly; Secure; SameSite=None"
    } else {
        "HttpOnly; SameSite=Lax"
    };
    HeaderValue::from_str(&format!(
        "{name}={value}; Max-Age={max_age_seconds}; Path=/; {attributes}"
    ))
    .map_err(|err| anyhow!("invalid cookie value for {name}: {err}"))
}

pub(crate) fn clear_auth_cookie(name: &str, secure: bool) -> Result<HeaderValue> {
    auth_cookie(name, "", 0, secure)
}

/// SQLSTATE 23505, unique_violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23505")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  User@Example.COM "), "user@example.com");
    }

    #[test]
    fn test_valid_email() {
        assert!(valid_email("user@example.com"));
        assert!(valid_email("first.last@sub.example.org"));
        assert!(!valid_email("user"));
        assert!(!valid_email("user@"));
        assert!(!valid_email("@example.com"));
        assert!(!valid_email("user@example"));
        assert!(!valid_email("user name@example.com"));
    }

    #[test]
    fn test_password_hash_round_trip() -> Result<()> {
        let hash = hash_password("hunter2hunter2")?;
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter2hunter2", &hash));
        assert!(!verify_password("hunter3hunter3", &hash));
        Ok(())
    }

    #[test]
    fn test_verify_password_rejects_garbage_hash() {
        assert!(!verify_password("password", "not-a-phc-string"));
    }

    #[test]
    fn test_generate_reset_token_is_unique_and_url_safe() {
        let one = generate_reset_token();
        let two = generate_reset_token();
        assert_ne!(one, two);
        assert!(one
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_hash_reset_token_is_stable() {
        let digest = hash_reset_token("fixed-token");
        assert_eq!(digest, hash_reset_token("fixed-token"));
        assert_eq!(digest.len(), 32);
        assert_ne!(digest, hash_reset_token("other-token"));
    }

    #[test]
    fn test_auth_cookie_attributes() -> Result<()> {
        let lax = auth_cookie("accessToken", "tok", 900, false)?;
        assert_eq!(
            lax.to_str()?,
            "accessToken=tok; Max-Age=900; Path=/; HttpOnly; SameSite=Lax"
        );

        let secure = auth_cookie("refreshToken", "tok", 604_800, true)?;
        assert_eq!(
            secure.to_str()?,
            "refreshToken=tok; Max-Age=604800; Path=/; HttpOnly; Secure; SameSite=None"
        );
        Ok(())
    }

    #[test]
    fn test_clear_auth_cookie_zeroes_max_age() -> Result<()> {
        let cleared = clear_auth_cookie("refreshToken", false)?;
        assert_eq!(
            cleared.to_str()?,
            "refreshToken=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax"
        );
        Ok(())
    }
}
