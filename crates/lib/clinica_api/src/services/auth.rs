//! Authentication service: login, refresh rotation, logout and current user.

use clinica_core::auth::password::verify_password;
use clinica_core::auth::roles::identity_for;
use clinica_core::models::auth::Claims;
use clinica_core::models::user::User;
use clinica_core::validation::email;
use tracing::{debug, info};

use super::within;
use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{LogoutResponse, TokenResponse, UserDto};

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".into())
}

/// Issue an access/refresh pair for `user`.
fn token_pair(state: &AppState, user: User) -> AppResult<TokenResponse> {
    let identity = identity_for(&user);
    let access_token = state.tokens.issue_access(&identity)?;
    let refresh_token = state.tokens.issue_refresh(&identity)?;
    Ok(TokenResponse {
        access_token,
        refresh_token,
        token_type: "Bearer",
        expires_in: state.tokens.config().access_ttl.num_seconds(),
        user: UserDto::from(user),
    })
}

/// Authenticate with email + password.
///
/// Unknown emails and wrong passwords produce the same error.
pub async fn login(state: &AppState, address: &str, password: &str) -> AppResult<TokenResponse> {
    let address = email::canonicalize(address);
    if address.is_empty() || password.is_empty() {
        return Err(AppError::Validation("email and password are required".into()));
    }

    let user = within(state.config.store_timeout, state.users.get_by_email(&address))
        .await?
        .ok_or_else(invalid_credentials)?;

    if !verify_password(password, &user.password_hash) {
        debug!(user_id = user.id, "login rejected: wrong password");
        return Err(invalid_credentials());
    }
    if !user.active {
        return Err(AppError::Unauthorized("User account is inactive".into()));
    }

    info!(user_id = user.id, role = %user.role, "user logged in");
    token_pair(state, user)
}

/// Exchange a refresh token for a new pair. The presented token is spent;
/// presenting it again, even concurrently, fails.
///
/// Expired refresh tokens are accepted within the refresh grace window. The
/// new pair reflects the user's current role and grants.
pub async fn refresh(state: &AppState, token: &str) -> AppResult<TokenResponse> {
    let claims = state.tokens.refresh_claims(token).await?;

    let user = within(state.config.store_timeout, state.users.get_by_id(claims.subject_id()))
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    if !user.active {
        return Err(AppError::Unauthorized("User account is inactive".into()));
    }

    state.tokens.consume(&claims).await?;
    debug!(user_id = user.id, "token refreshed");
    token_pair(state, user)
}

/// Revoke the caller's access token and, if given, their refresh token.
pub async fn logout(state: &AppState, claims: &Claims, refresh_token: Option<&str>) -> AppResult<LogoutResponse> {
    state.tokens.revoke_claims(claims).await?;
    if let Some(token) = refresh_token
        && let Err(e) = state.tokens.revoke(token).await
    {
        debug!(error = %e, "ignoring unrevocable refresh token on logout");
    }
    info!(user_id = claims.subject_id(), "user logged out");
    Ok(LogoutResponse { success: true })
}

/// The authenticated user's own record.
pub async fn me(state: &AppState, claims: Option<&Claims>) -> AppResult<UserDto> {
    let claims = claims.ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;
    let user = within(state.config.store_timeout, state.users.get_by_id(claims.subject_id()))
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))?;
    Ok(UserDto::from(user))
}
