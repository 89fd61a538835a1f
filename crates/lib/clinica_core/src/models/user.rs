//! User (staff account) domain models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A stored user. The password hash never leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    #[serde(rename = "nome")]
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    #[serde(rename = "perfil")]
    pub role: String,
    /// Grants on top of the role's defaults.
    #[serde(rename = "permissoes")]
    pub permissions: Vec<String>,
    #[serde(rename = "escopos")]
    pub scopes: Vec<String>,
    #[serde(rename = "ativo")]
    pub active: bool,
    #[serde(rename = "data_inicio_inatividade")]
    pub inactive_from: Option<NaiveDate>,
    #[serde(rename = "data_fim_inatividade")]
    pub inactive_until: Option<NaiveDate>,
    #[serde(rename = "motivo_inatividade")]
    pub inactive_reason: Option<String>,
    #[serde(rename = "criado_em")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "atualizado_em")]
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub deleted_by: Option<i64>,
}

/// Validated input for a new user; `password_hash` is already hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub permissions: Vec<String>,
    pub scopes: Vec<String>,
}

/// Create-user request body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CreateUser {
    #[serde(rename = "nome")]
    pub name: String,
    pub email: String,
    #[serde(rename = "senha")]
    pub password: String,
    #[serde(rename = "perfil")]
    pub role: String,
    #[serde(rename = "permissoes")]
    pub permissions: Vec<String>,
    #[serde(rename = "escopos")]
    pub scopes: Vec<String>,
}

/// Partial user update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UserChanges {
    #[serde(rename = "nome")]
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "perfil")]
    pub role: Option<String>,
    #[serde(rename = "permissoes")]
    pub permissions: Option<Vec<String>>,
    #[serde(rename = "escopos")]
    pub scopes: Option<Vec<String>>,
    #[serde(rename = "ativo")]
    pub active: Option<bool>,
    #[serde(rename = "data_inicio_inatividade")]
    pub inactive_from: Option<NaiveDate>,
    #[serde(rename = "data_fim_inatividade")]
    pub inactive_until: Option<NaiveDate>,
    #[serde(rename = "motivo_inatividade")]
    pub inactive_reason: Option<String>,
}

impl UserChanges {
    pub fn apply(&self, mut user: User) -> User {
        if let Some(name) = self.name.as_ref().filter(|n| !n.trim().is_empty()) {
            user.name = name.trim().to_string();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(role) = &self.role {
            user.role = role.clone();
        }
        if let Some(permissions) = &self.permissions {
            user.permissions = permissions.clone();
        }
        if let Some(scopes) = &self.scopes {
            user.scopes = scopes.clone();
        }
        if let Some(active) = self.active {
            user.active = active;
        }
        if self.inactive_from.is_some() {
            user.inactive_from = self.inactive_from;
        }
        if self.inactive_until.is_some() {
            user.inactive_until = self.inactive_until;
        }
        if self.inactive_reason.is_some() {
            user.inactive_reason = self.inactive_reason.clone();
        }
        user
    }
}

/// Column filters for user listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UserFilter {
    #[serde(rename = "nome")]
    pub name: Option<String>,
    #[serde(rename = "perfil")]
    pub role: Option<String>,
    #[serde(rename = "ativo")]
    pub active: Option<bool>,
}

/// Columns that can be checked for uniqueness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Email,
}
