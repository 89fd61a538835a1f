//! Role catalogue.
//!
//! A user's token carries their role plus the role's default permissions
//! merged with any per-user grants.

use std::collections::BTreeSet;

use crate::models::auth::Identity;
use crate::models::user::User;

pub const ADMIN: &str = "admin";
pub const THERAPIST: &str = "terapeuta";
pub const RECEPTION: &str = "recepcao";

/// Every role a user may be assigned.
pub const ALL: [&str; 3] = [ADMIN, THERAPIST, RECEPTION];

pub fn is_known(role: &str) -> bool {
    ALL.contains(&role)
}

/// Permissions implied by a role. Admins need none: the permission engine
/// lets them through unconditionally.
pub fn default_permissions(role: &str) -> &'static [&'static str] {
    match role {
        THERAPIST => &["pacientes:*"],
        RECEPTION => &["pacientes:read", "pacientes:create", "pacientes:update"],
        _ => &[],
    }
}

/// Token identity for a stored user.
pub fn identity_for(user: &User) -> Identity {
    let permissions: BTreeSet<String> = default_permissions(&user.role)
        .iter()
        .map(|p| p.to_string())
        .chain(user.permissions.iter().cloned())
        .collect();

    Identity {
        subject_id: user.id,
        username: user.name.clone(),
        email: user.email.clone(),
        roles: BTreeSet::from([user.role.clone()]),
        permissions,
        scopes: user.scopes.iter().cloned().collect(),
    }
}
