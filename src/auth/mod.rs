//! Credential handling: Argon2id password hashing and opaque session tokens.

pub mod password;
pub mod token;

pub use password::{hash_password, verify_password};
pub use token::generate_session_token;

/// Sessions live for 30 days from sign-in.
pub const SESSION_TTL_MILLIS: i64 = 30 * 24 * 60 * 60 * 1000;

/// Minimum accepted password length for new accounts.
pub const MIN_PASSWORD_LENGTH: usize = 8;
