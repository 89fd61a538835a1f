//! Data store seams.
//!
//! Services and access validators depend on these traits only. Every read
//! excludes soft-deleted rows, and uniqueness is scoped to live rows.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::page::{Page, PageRequest};
use crate::models::patient::{Patient, PatientData, PatientField, PatientFilter};
use crate::models::user::{NewUser, User, UserField, UserFilter};

/// Data store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),
}

#[async_trait]
pub trait PatientStore: Send + Sync {
    /// Connectivity check for the health endpoint.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn create(&self, data: &PatientData, actor_id: i64) -> Result<Patient, StoreError>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Patient>, StoreError>;

    /// Lookup by canonical CPF.
    async fn get_by_cpf(&self, cpf: &str) -> Result<Option<Patient>, StoreError>;

    /// Replace the editable fields of a live patient.
    async fn update(&self, id: i64, data: &PatientData, actor_id: i64) -> Result<Patient, StoreError>;

    /// `NotFound` when no live row has this id, including rows already deleted.
    async fn soft_delete(&self, id: i64, actor_id: i64) -> Result<(), StoreError>;

    async fn list(&self, filter: &PatientFilter, page: PageRequest) -> Result<Page<Patient>, StoreError>;

    /// Case-insensitive substring search over name, CPF, email, phone and diagnosis.
    async fn search(&self, query: &str, page: PageRequest) -> Result<Page<Patient>, StoreError>;

    async fn exists_by_field(
        &self,
        field: PatientField,
        value: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: &NewUser) -> Result<User, StoreError>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    /// Case-insensitive email lookup.
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Persist every editable field of `user` except the password hash.
    async fn update(&self, user: &User) -> Result<User, StoreError>;

    async fn set_password(&self, id: i64, password_hash: &str) -> Result<(), StoreError>;

    async fn soft_delete(&self, id: i64, actor_id: i64) -> Result<(), StoreError>;

    async fn list(&self, filter: &UserFilter, page: PageRequest) -> Result<Page<User>, StoreError>;

    /// Case-insensitive substring search over name and email.
    async fn search(&self, query: &str, page: PageRequest) -> Result<Page<User>, StoreError>;

    async fn exists_by_field(
        &self,
        field: UserField,
        value: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, StoreError>;

    /// Whether any live user holds `role`.
    async fn any_with_role(&self, role: &str) -> Result<bool, StoreError>;
}
