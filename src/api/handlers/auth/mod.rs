//! Auth handlers and supporting modules.
//!
//! This module owns the whole token lifecycle: credential exchange, the
//! stateless access / stateful refresh pair, rotation, revocation, and
//! password recovery.
//!
//! ## Token model
//!
//! - **Access tokens** are short-lived `HS256` JWTs verified without any
//!   store lookup on the hot path (existence, active flag, and watermark
//!   checks excepted).
//! - **Refresh tokens** are longer-lived JWTs that must also be present in
//!   the owner's active set, a `TEXT[]` column mutated only by
//!   single-statement updates. Rotation swaps old for new atomically, so a
//!   replayed token loses the race and is rejected.
//! - **Revoked tokens** land in a ledger keyed by the token itself and are
//!   garbage collected after their signed expiry passes.

pub(crate) mod error;
pub(crate) mod login;
pub(crate) mod password;
pub(crate) mod principal;
pub(crate) mod register;
pub(crate) mod session;
mod state;
pub(crate) mod storage;
mod token;
pub(crate) mod types;
pub(crate) mod utils;

pub use state::{AuthConfig, AuthState};
pub use token::TokenKeys;

#[cfg(test)]
mod tests;
