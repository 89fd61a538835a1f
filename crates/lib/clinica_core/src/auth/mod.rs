//! Authentication and authorization logic.
//!
//! Provides password hashing, JWT issuance and verification, token
//! revocation, and the permission engine shared by the access validators and
//! `clinica_api`.

pub mod jwt;
pub mod password;
pub mod permissions;
pub mod revocation;
pub mod roles;

use thiserror::Error;

/// Token verification failures.
///
/// Callers branch on these: `Expired` tokens can still be refreshed,
/// `Invalid` and `Revoked` ones cannot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Invalid token")]
    Invalid,

    #[error("Token expired")]
    Expired,

    #[error("Token revoked")]
    Revoked,

    #[error("Token signing error: {0}")]
    Signing(String),

    #[error("Revocation store error: {0}")]
    Store(String),
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    CredentialError,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
