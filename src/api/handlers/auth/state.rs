//! Tunables and shared state for the token lifecycle.

use anyhow::Result;
use chrono::Utc;
use uuid::Uuid;

use super::{
    principal::Role,
    token::{TokenKeys, TokenPair},
};

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_REMEMBER_ME_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;
const DEFAULT_RESET_TOKEN_TTL_SECONDS: i64 = 10 * 60;
const DEFAULT_MAX_ACTIVE_REFRESH_TOKENS: i32 = 5;

/// Token lifecycle configuration. Defaults cover production; the setters
/// exist so tests can shrink the windows.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    frontend_base_url: String,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    remember_me_ttl_seconds: i64,
    reset_token_ttl_seconds: i64,
    max_active_refresh_tokens: i32,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            remember_me_ttl_seconds: DEFAULT_REMEMBER_ME_TTL_SECONDS,
            reset_token_ttl_seconds: DEFAULT_RESET_TOKEN_TTL_SECONDS,
            max_active_refresh_tokens: DEFAULT_MAX_ACTIVE_REFRESH_TOKENS,
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_remember_me_ttl_seconds(mut self, seconds: i64) -> Self {
        self.remember_me_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_reset_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_max_active_refresh_tokens(mut self, max: i32) -> Self {
        self.max_active_refresh_tokens = max;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub const fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub const fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    #[must_use]
    pub const fn remember_me_ttl_seconds(&self) -> i64 {
        self.remember_me_ttl_seconds
    }

    #[must_use]
    pub const fn reset_token_ttl_seconds(&self) -> i64 {
        self.reset_token_ttl_seconds
    }

    #[must_use]
    pub const fn max_active_refresh_tokens(&self) -> i32 {
        self.max_active_refresh_tokens
    }

    /// Cross-site cookie attributes are only usable over TLS, so `Secure` +
    /// `SameSite=None` follow the scheme of the frontend we serve.
    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

/// Shared auth state handed to every handler via an `Extension`.
pub struct AuthState {
    config: AuthConfig,
    keys: TokenKeys,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, keys: TokenKeys) -> Self {
        Self { config, keys }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub(crate) fn keys(&self) -> &TokenKeys {
        &self.keys
    }

    /// Mint a pair for a principal. Remember-me stretches the refresh window
    /// from seven days to thirty.
    pub(crate) fn issue_pair(
        &self,
        user_id: Uuid,
        role: Role,
        remember_me: bool,
    ) -> Result<TokenPair> {
        let refresh_ttl = if remember_me {
            self.config.remember_me_ttl_seconds
        } else {
            self.config.refresh_ttl_seconds
        };
        self.keys
            .issue_pair(user_id, role, self.config.access_ttl_seconds, refresh_ttl, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn test_state(frontend: &str) -> AuthState {
        let keys = TokenKeys::from_secrets(
            &SecretString::from("access"),
            &SecretString::from("refresh"),
        );
        AuthState::new(AuthConfig::new(frontend.to_string()), keys)
    }

    #[test]
    fn test_defaults() {
        let config = AuthConfig::new("http://localhost:3000".to_string());
        assert_eq!(config.access_ttl_seconds(), 900);
        assert_eq!(config.refresh_ttl_seconds(), 7 * 24 * 60 * 60);
        assert_eq!(config.remember_me_ttl_seconds(), 30 * 24 * 60 * 60);
        assert_eq!(config.reset_token_ttl_seconds(), 600);
        assert_eq!(config.max_active_refresh_tokens(), 5);
    }

    #[test]
    fn test_cookie_secure_follows_frontend_scheme() {
        assert!(!test_state("http://localhost:3000").config().cookie_secure());
        assert!(test_state("https://app.example.com").config().cookie_secure());
    }

    #[test]
    fn test_issue_pair_remember_me_window() -> Result<()> {
        let state = test_state("http://localhost:3000");
        let user_id = Uuid::new_v4();

        let short = state.issue_pair(user_id, Role::User, false)?;
        let long = state.issue_pair(user_id, Role::User, true)?;

        let short_window = short.refresh_expires_at.timestamp() - Utc::now().timestamp();
        let long_window = long.refresh_expires_at.timestamp() - Utc::now().timestamp();
        assert!((short_window - 7 * 24 * 60 * 60).abs() <= 2);
        assert!((long_window - 30 * 24 * 60 * 60).abs() <= 2);
        Ok(())
    }

    #[test]
    fn test_builder_overrides() {
        let config = AuthConfig::new("http://localhost:3000".to_string())
            .with_access_ttl_seconds(60)
            .with_refresh_ttl_seconds(120)
            .with_remember_me_ttl_seconds(240)
            .with_reset_token_ttl_seconds(30)
            .with_max_active_refresh_tokens(2);
        assert_eq!(config.access_ttl_seconds(), 60);
        assert_eq!(config.refresh_ttl_seconds(), 120);
        assert_eq!(config.remember_me_ttl_seconds(), 240);
        assert_eq!(config.reset_token_ttl_seconds(), 30);
        assert_eq!(config.max_active_refresh_tokens(), 2);
    }
}
