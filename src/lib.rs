//! # Claviger (Token Lifecycle & Authentication)
//!
//! `claviger` authenticates principals for an HTTP API and manages the
//! credentials that represent an authenticated session: a short-lived access
//! token and a longer-lived refresh token.
//!
//! ## Token Lifecycle
//!
//! - **Issuance:** login mints a signed access/refresh pair. Access tokens
//!   live 15 minutes; refresh tokens live 7 days, or 30 days with the
//!   remember-me flag.
//! - **Rotation:** exchanging a refresh token atomically swaps it for a new
//!   one in the owner's active set and retires the old token into the
//!   revocation ledger. Presenting a consumed token fails.
//! - **Revocation:** logout removes the presented refresh token from the
//!   active set and blacklists it. Expired ledger rows are garbage-collected
//!   by a background worker.
//! - **Watermark:** changing a password bumps `password_changed_at`; any
//!   token issued before that instant is rejected regardless of its expiry.
//!
//! ## Guards
//!
//! Request-time policies compose the verifier, the user store, and the
//! ledger: mandatory bearer auth, role-gated auth (header or cookie),
//! best-effort auth, and refresh-only auth for the rotation endpoint.
//!
//! Access tokens are stateless by design: there is no server-side revocation
//! for them before natural expiry, which is why their lifetime is short.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
