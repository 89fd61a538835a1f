//! Access validators.
//!
//! Each protected entity gets a validator that runs its gates in a fixed
//! order: authentication, then authorization, then any check that touches the
//! data store. The first failing gate wins.

pub mod patient;
pub mod user;

use thiserror::Error;

use crate::auth::permissions::{has_permission, permission};
use crate::models::auth::Claims;
use crate::store::StoreError;

/// Entity operations, named after the action half of a permission string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// Access gate failures.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Missing permission: {0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    DuplicateResource(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AccessError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

impl From<StoreError> for AccessError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(format!("{what} not found")),
            StoreError::Duplicate(what) => Self::DuplicateResource(format!("{what} already registered")),
            StoreError::DbError(e) => Self::Internal(e.to_string()),
        }
    }
}

/// A request that passed every gate: who is acting, and on what.
#[derive(Debug, Clone, PartialEq)]
pub struct Granted<T> {
    pub actor_id: i64,
    pub value: T,
}

/// Authentication then authorization for `"<resource>:<operation>"`.
pub fn authorize<'a>(
    claims: Option<&'a Claims>,
    resource: &str,
    operation: Operation,
) -> Result<&'a Claims, AccessError> {
    let claims = claims.ok_or(AccessError::Unauthorized)?;
    let required = permission(resource, operation.as_str());
    if !has_permission(&claims.identity, &required) {
        return Err(AccessError::Forbidden(required));
    }
    Ok(claims)
}
