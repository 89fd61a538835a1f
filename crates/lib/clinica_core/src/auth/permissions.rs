//! Permission engine.
//!
//! Permissions and scopes are `"<resource>:<action>"` strings. A grant of
//! `"<resource>:*"` covers every action on that resource; no other wildcard
//! form exists. The `admin` role overrides permission checks but not scope
//! checks.

use crate::models::auth::Identity;

use super::roles::ADMIN;

/// Build a `"<resource>:<action>"` permission string.
pub fn permission(resource: &str, action: &str) -> String {
    format!("{resource}:{action}")
}

/// Exact role membership.
pub fn has_role(identity: &Identity, role: &str) -> bool {
    identity.roles.contains(role)
}

/// Admins pass unconditionally; otherwise an exact or wildcard grant is needed.
pub fn has_permission(identity: &Identity, required: &str) -> bool {
    has_role(identity, ADMIN) || grants_match(identity.permissions.iter(), required)
}

/// Same matching as [`has_permission`], without the admin override.
pub fn has_scope(identity: &Identity, required: &str) -> bool {
    grants_match(identity.scopes.iter(), required)
}

fn grants_match<'a>(mut grants: impl Iterator<Item = &'a String>, required: &str) -> bool {
    grants.any(|grant| grant_matches(grant, required))
}

fn grant_matches(grant: &str, required: &str) -> bool {
    if grant == required {
        return true;
    }
    match grant.strip_suffix(":*") {
        Some(prefix) => required
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with(':')),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_permissions(perms: &[&str]) -> Identity {
        Identity::new(1, "u", "u@clinica.com").with_permissions(perms.iter().copied())
    }

    #[test]
    fn wildcard_covers_every_action_of_the_resource() {
        let id = with_permissions(&["pacientes:*"]);
        assert!(has_permission(&id, "pacientes:delete"));
        assert!(has_permission(&id, "pacientes:read"));
        assert!(!has_permission(&id, "usuarios:read"));
    }

    #[test]
    fn wildcard_needs_the_separator() {
        let id = with_permissions(&["pac:*"]);
        assert!(!has_permission(&id, "pacientes:read"));
    }

    #[test]
    fn exact_grant_matches_only_itself() {
        let id = with_permissions(&["pacientes:view"]);
        assert!(has_permission(&id, "pacientes:view"));
        assert!(!has_permission(&id, "pacientes:delete"));
    }

    #[test]
    fn no_global_or_mid_string_wildcards() {
        let id = with_permissions(&["*", "pacientes:*:read", "*:read"]);
        assert!(!has_permission(&id, "pacientes:read"));
        assert!(!has_permission(&id, "anything:else"));
    }

    #[test]
    fn admin_overrides_permissions_even_when_empty() {
        let id = Identity::new(1, "root", "root@clinica.com").with_roles(["admin"]);
        assert!(id.permissions.is_empty());
        assert!(has_permission(&id, "anything:whatever"));
    }

    #[test]
    fn admin_does_not_override_scopes() {
        let id = Identity::new(1, "root", "root@clinica.com").with_roles(["admin"]);
        assert!(!has_scope(&id, "api:read"));

        let id = id.with_scopes(["api:*"]);
        assert!(has_scope(&id, "api:read"));
        assert!(!has_scope(&id, "admin:read"));
    }

    #[test]
    fn roles_are_exact() {
        let id = Identity::new(1, "u", "u@clinica.com").with_roles(["terapeuta"]);
        assert!(has_role(&id, "terapeuta"));
        assert!(!has_role(&id, "terapeutas"));
        assert!(!has_role(&id, "admin"));
    }

    #[test]
    fn builds_permission_strings() {
        assert_eq!(permission("pacientes", "update"), "pacientes:update");
    }
}
