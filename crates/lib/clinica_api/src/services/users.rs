//! User management service.

use std::sync::Arc;

use clinica_core::access::Operation;
use clinica_core::auth::password::{check_password_policy, hash_password};
use clinica_core::auth::roles;
use clinica_core::models::auth::Claims;
use clinica_core::models::page::PageRequest;
use clinica_core::models::user::{CreateUser, NewUser, UserChanges, UserFilter};
use clinica_core::store::UserStore;
use clinica_core::validation::email;
use tracing::{info, warn};

use super::within;
use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{ListResponse, UserDto};

pub async fn create(state: &AppState, claims: Option<&Claims>, input: &CreateUser) -> AppResult<UserDto> {
    let deadline = state.config.store_timeout;
    let granted = within(deadline, state.user_access.validate_create(claims, input)).await?;
    let input = granted.value;
    let new = NewUser {
        password_hash: hash_password(&input.password)?,
        name: input.name,
        email: input.email,
        role: input.role,
        permissions: input.permissions,
        scopes: input.scopes,
    };
    let user = within(deadline, state.users.create(&new)).await?;
    info!(user_id = user.id, role = %user.role, actor_id = granted.actor_id, "user created");
    Ok(UserDto::from(user))
}

pub async fn get(state: &AppState, claims: Option<&Claims>, id: i64) -> AppResult<UserDto> {
    let granted = within(state.config.store_timeout, state.user_access.validate_read(claims, id)).await?;
    Ok(UserDto::from(granted.value))
}

pub async fn list(
    state: &AppState,
    claims: Option<&Claims>,
    filter: &UserFilter,
    page: PageRequest,
) -> AppResult<ListResponse<UserDto>> {
    state.user_access.authorize(claims, Operation::Read)?;
    let page = within(state.config.store_timeout, state.users.list(filter, page)).await?;
    Ok(ListResponse::from_page(page))
}

pub async fn search(
    state: &AppState,
    claims: Option<&Claims>,
    query: &str,
    page: PageRequest,
) -> AppResult<ListResponse<UserDto>> {
    state.user_access.authorize(claims, Operation::Read)?;
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::Validation("search query is required".into()));
    }
    let page = within(state.config.store_timeout, state.users.search(query, page)).await?;
    Ok(ListResponse::from_page(page))
}

pub async fn update(
    state: &AppState,
    claims: Option<&Claims>,
    id: i64,
    changes: &UserChanges,
) -> AppResult<UserDto> {
    let deadline = state.config.store_timeout;
    let granted = within(deadline, state.user_access.validate_update(claims, id, changes)).await?;
    let user = within(deadline, state.users.update(&granted.value)).await?;
    info!(user_id = id, actor_id = granted.actor_id, "user updated");
    Ok(UserDto::from(user))
}

pub async fn delete(state: &AppState, claims: Option<&Claims>, id: i64) -> AppResult<()> {
    let deadline = state.config.store_timeout;
    let granted = within(deadline, state.user_access.validate_delete(claims, id)).await?;
    within(deadline, state.users.soft_delete(id, granted.actor_id)).await?;
    info!(user_id = id, actor_id = granted.actor_id, "user deleted");
    Ok(())
}

pub async fn change_password(
    state: &AppState,
    claims: Option<&Claims>,
    id: i64,
    current: Option<&str>,
    new_password: &str,
) -> AppResult<()> {
    let deadline = state.config.store_timeout;
    let granted = within(
        deadline,
        state
            .user_access
            .validate_password_change(claims, id, current, new_password),
    )
    .await?;
    let hash = hash_password(new_password)?;
    within(deadline, state.users.set_password(id, &hash)).await?;
    info!(user_id = id, actor_id = granted.actor_id, "password changed");
    Ok(())
}

/// Create the bootstrap admin unless an admin already exists.
///
/// Returns whether a user was created.
pub async fn ensure_admin(users: &Arc<dyn UserStore>, address: &str, password: &str) -> AppResult<bool> {
    if users.any_with_role(roles::ADMIN).await? {
        return Ok(false);
    }
    let address = email::canonicalize(address);
    if !email::validate(&address) {
        return Err(AppError::Validation(format!("invalid admin email: {address}")));
    }
    check_password_policy(password)?;

    if users.get_by_email(&address).await?.is_some() {
        warn!(email = %address, "bootstrap admin email belongs to a non-admin user; skipping");
        return Ok(false);
    }

    let user = users
        .create(&NewUser {
            name: "Administrador".into(),
            email: address,
            password_hash: hash_password(password)?,
            role: roles::ADMIN.into(),
            permissions: Vec::new(),
            scopes: Vec::new(),
        })
        .await?;
    info!(user_id = user.id, email = %user.email, "bootstrap admin created");
    Ok(true)
}
