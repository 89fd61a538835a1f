//! User (staff account) access validator.

use std::sync::Arc;

use super::{AccessError, Granted, Operation, authorize};
use crate::auth::password::{check_password_policy, verify_password};
use crate::auth::permissions::{has_permission, permission};
use crate::auth::roles;
use crate::models::auth::Claims;
use crate::models::user::{CreateUser, User, UserChanges, UserField};
use crate::store::UserStore;
use crate::validation::email;

/// Permission resource name for users.
pub const RESOURCE: &str = "usuarios";

const NAME_LEN: std::ops::RangeInclusive<usize> = 3..=50;

fn check_profile(name: &str, address: &str, role: &str) -> Result<(), AccessError> {
    if !NAME_LEN.contains(&name.chars().count()) {
        return Err(AccessError::invalid("name must be between 3 and 50 characters"));
    }
    if !email::validate(address) {
        return Err(AccessError::invalid("invalid email"));
    }
    if role.is_empty() {
        return Err(AccessError::invalid("role is required"));
    }
    if !roles::is_known(role) {
        return Err(AccessError::invalid(format!("unknown role: {role}")));
    }
    Ok(())
}

fn check_grants(grants: &[String]) -> Result<(), AccessError> {
    match grants.iter().find(|g| !is_grant(g)) {
        Some(bad) => Err(AccessError::invalid(format!("malformed permission: {bad}"))),
        None => Ok(()),
    }
}

/// `"<resource>:<action>"` with both halves non-empty.
fn is_grant(grant: &str) -> bool {
    grant
        .split_once(':')
        .is_some_and(|(resource, action)| !resource.is_empty() && !action.is_empty())
}

/// Gatekeeper for every user operation.
#[derive(Clone)]
pub struct UserAccessValidator {
    store: Arc<dyn UserStore>,
}

impl UserAccessValidator {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub fn authorize<'a>(&self, claims: Option<&'a Claims>, operation: Operation) -> Result<&'a Claims, AccessError> {
        authorize(claims, RESOURCE, operation)
    }

    /// Returns the canonical input; the caller hashes the password.
    pub async fn validate_create(
        &self,
        claims: Option<&Claims>,
        input: &CreateUser,
    ) -> Result<Granted<CreateUser>, AccessError> {
        let actor = self.authorize(claims, Operation::Create)?;

        let user = CreateUser {
            name: input.name.trim().to_string(),
            email: email::canonicalize(&input.email),
            role: input.role.trim().to_string(),
            ..input.clone()
        };
        check_profile(&user.name, &user.email, &user.role)?;
        check_password_policy(&user.password).map_err(|e| AccessError::invalid(e.to_string()))?;
        check_grants(&user.permissions)?;
        check_grants(&user.scopes)?;
        self.ensure_email_free(&user.email, None).await?;

        Ok(Granted {
            actor_id: actor.subject_id(),
            value: user,
        })
    }

    pub async fn validate_read(&self, claims: Option<&Claims>, id: i64) -> Result<Granted<User>, AccessError> {
        let actor = self.authorize(claims, Operation::Read)?;
        let user = self.existing(id).await?;
        Ok(Granted {
            actor_id: actor.subject_id(),
            value: user,
        })
    }

    /// Returns the merged record to persist.
    pub async fn validate_update(
        &self,
        claims: Option<&Claims>,
        id: i64,
        changes: &UserChanges,
    ) -> Result<Granted<User>, AccessError> {
        let actor = self.authorize(claims, Operation::Update)?;
        let existing = self.existing(id).await?;

        let mut merged = changes.apply(existing.clone());
        merged.email = email::canonicalize(&merged.email);
        merged.role = merged.role.trim().to_string();
        check_profile(&merged.name, &merged.email, &merged.role)?;
        check_grants(&merged.permissions)?;
        check_grants(&merged.scopes)?;
        if let (Some(from), Some(until)) = (merged.inactive_from, merged.inactive_until)
            && until < from
        {
            return Err(AccessError::invalid("inactivity end precedes its start"));
        }
        if !merged.email.eq_ignore_ascii_case(&existing.email) {
            self.ensure_email_free(&merged.email, Some(id)).await?;
        }

        Ok(Granted {
            actor_id: actor.subject_id(),
            value: merged,
        })
    }

    pub async fn validate_delete(&self, claims: Option<&Claims>, id: i64) -> Result<Granted<User>, AccessError> {
        let actor = self.authorize(claims, Operation::Delete)?;
        let user = self.existing(id).await?;
        Ok(Granted {
            actor_id: actor.subject_id(),
            value: user,
        })
    }

    /// Users may change their own password by presenting the current one;
    /// holders of `usuarios:update` may change anyone's without it.
    pub async fn validate_password_change(
        &self,
        claims: Option<&Claims>,
        id: i64,
        current: Option<&str>,
        new_password: &str,
    ) -> Result<Granted<User>, AccessError> {
        let actor = claims.ok_or(AccessError::Unauthorized)?;
        let required = permission(RESOURCE, Operation::Update.as_str());
        let privileged = has_permission(&actor.identity, &required);
        if !privileged && actor.subject_id() != id {
            return Err(AccessError::Forbidden(required));
        }
        check_password_policy(new_password).map_err(|e| AccessError::invalid(e.to_string()))?;

        let user = self.existing(id).await?;
        if !privileged {
            let current = current.unwrap_or_default();
            if !verify_password(current, &user.password_hash) {
                return Err(AccessError::invalid("current password is incorrect"));
            }
        }

        Ok(Granted {
            actor_id: actor.subject_id(),
            value: user,
        })
    }

    async fn existing(&self, id: i64) -> Result<User, AccessError> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("user {id} not found")))
    }

    async fn ensure_email_free(&self, address: &str, exclude_id: Option<i64>) -> Result<(), AccessError> {
        if self.store.exists_by_field(UserField::Email, address, exclude_id).await? {
            return Err(AccessError::DuplicateResource("email already registered".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::test_support::claims;
    use crate::auth::password::hash_password;
    use crate::models::user::NewUser;
    use crate::store::memory::MemoryUserStore;

    fn setup() -> (Arc<MemoryUserStore>, UserAccessValidator) {
        let store = Arc::new(MemoryUserStore::new());
        (store.clone(), UserAccessValidator::new(store))
    }

    fn admin() -> Claims {
        claims(1, &["admin"], &[])
    }

    fn create_input(email: &str) -> CreateUser {
        CreateUser {
            name: "Joana Lima".into(),
            email: email.into(),
            password: "segredo1".into(),
            role: "recepcao".into(),
            ..CreateUser::default()
        }
    }

    async fn stored(store: &MemoryUserStore, email: &str, password: &str) -> User {
        store
            .create(&NewUser {
                name: "Joana Lima".into(),
                email: email.into(),
                password_hash: hash_password(password).unwrap(),
                role: "recepcao".into(),
                permissions: vec![],
                scopes: vec![],
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_normalizes_and_checks_rules() {
        let (_, validator) = setup();
        let granted = validator
            .validate_create(Some(&admin()), &create_input(" Joana@Clinica.COM "))
            .await
            .unwrap();
        assert_eq!(granted.value.email, "joana@clinica.com");

        let bad = [
            CreateUser {
                name: "Jo".into(),
                ..create_input("a@clinica.com")
            },
            CreateUser {
                password: "12345".into(),
                ..create_input("a@clinica.com")
            },
            CreateUser {
                role: "gerente".into(),
                ..create_input("a@clinica.com")
            },
            CreateUser {
                role: String::new(),
                ..create_input("a@clinica.com")
            },
            CreateUser {
                permissions: vec!["pacientes".into()],
                ..create_input("a@clinica.com")
            },
            create_input("not-an-email"),
        ];
        for input in &bad {
            let err = validator.validate_create(Some(&admin()), input).await.unwrap_err();
            assert!(matches!(err, AccessError::InvalidInput(_)), "{input:?}");
        }
    }

    #[tokio::test]
    async fn create_with_taken_email_is_duplicate() {
        let (store, validator) = setup();
        stored(&store, "joana@clinica.com", "segredo1").await;
        let err = validator
            .validate_create(Some(&admin()), &create_input("JOANA@clinica.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::DuplicateResource(_)));
    }

    #[tokio::test]
    async fn create_requires_permission() {
        let (_, validator) = setup();
        let therapist = claims(2, &["terapeuta"], &["pacientes:*"]);
        assert!(matches!(
            validator.validate_create(None, &create_input("a@clinica.com")).await,
            Err(AccessError::Unauthorized)
        ));
        assert!(matches!(
            validator
                .validate_create(Some(&therapist), &create_input("a@clinica.com"))
                .await,
            Err(AccessError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn update_keeps_own_email_and_rejects_taken_one() {
        let (store, validator) = setup();
        let joana = stored(&store, "joana@clinica.com", "segredo1").await;
        stored(&store, "rui@clinica.com", "segredo1").await;

        let rename = UserChanges {
            name: Some("Joana L.".into()),
            email: Some("Joana@clinica.com".into()),
            ..UserChanges::default()
        };
        let granted = validator.validate_update(Some(&admin()), joana.id, &rename).await.unwrap();
        assert_eq!(granted.value.name, "Joana L.");

        let steal = UserChanges {
            email: Some("rui@clinica.com".into()),
            ..UserChanges::default()
        };
        assert!(matches!(
            validator.validate_update(Some(&admin()), joana.id, &steal).await,
            Err(AccessError::DuplicateResource(_))
        ));
    }

    #[tokio::test]
    async fn self_password_change_needs_current_password() {
        let (store, validator) = setup();
        let joana = stored(&store, "joana@clinica.com", "segredo1").await;
        let me = claims(joana.id, &["recepcao"], &[]);

        assert!(matches!(
            validator
                .validate_password_change(Some(&me), joana.id, Some("errada"), "novasenha")
                .await,
            Err(AccessError::InvalidInput(_))
        ));
        assert!(matches!(
            validator
                .validate_password_change(Some(&me), joana.id, None, "novasenha")
                .await,
            Err(AccessError::InvalidInput(_))
        ));
        assert!(
            validator
                .validate_password_change(Some(&me), joana.id, Some("segredo1"), "novasenha")
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn password_change_for_others() {
        let (store, validator) = setup();
        let joana = stored(&store, "joana@clinica.com", "segredo1").await;
        let other = claims(joana.id + 1, &["recepcao"], &[]);

        assert!(matches!(
            validator
                .validate_password_change(Some(&other), joana.id, Some("segredo1"), "novasenha")
                .await,
            Err(AccessError::Forbidden(_))
        ));
        assert!(
            validator
                .validate_password_change(Some(&admin()), joana.id, None, "novasenha")
                .await
                .is_ok()
        );
        assert!(matches!(
            validator
                .validate_password_change(Some(&admin()), joana.id, None, "123")
                .await,
            Err(AccessError::InvalidInput(_))
        ));
        assert!(matches!(
            validator
                .validate_password_change(None, joana.id, None, "novasenha")
                .await,
            Err(AccessError::Unauthorized)
        ));
    }
}
