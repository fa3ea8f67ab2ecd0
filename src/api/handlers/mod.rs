//! API handlers for the auth, profile, and admin surfaces.

pub mod auth;
pub mod health;
pub mod me;
pub mod root;
pub mod users;
