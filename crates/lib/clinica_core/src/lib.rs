//! # clinica_core
//!
//! Core domain logic for Clinica: Brazilian document validation, session
//! tokens, the permission engine, data stores and the access validators that
//! gate every patient and user operation.

pub mod access;
pub mod auth;
pub mod migrate;
pub mod models;
pub mod store;
pub mod validation;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
