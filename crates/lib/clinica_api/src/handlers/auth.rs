//! Authentication request handlers.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::Caller;
use crate::models::{LoginRequest, LogoutRequest, LogoutResponse, RefreshRequest, TokenResponse, UserDto};
use crate::services::auth;

/// `POST /api/auth/login`: authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let resp = auth::login(&state, &body.email, &body.senha).await?;
    Ok(Json(resp))
}

/// `POST /api/auth/refresh-token`: exchange a token for a new pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<TokenResponse>> {
    let resp = auth::refresh(&state, &body.refresh_token).await?;
    Ok(Json(resp))
}

/// `POST /api/auth/logout`: revoke the caller's tokens. Requires authentication.
pub async fn logout_handler(
    State(state): State<AppState>,
    caller: Caller,
    body: Bytes,
) -> AppResult<Json<LogoutResponse>> {
    let claims = caller
        .claims()
        .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;
    // The body is optional.
    let body: LogoutRequest = if body.is_empty() {
        LogoutRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::Validation(e.to_string()))?
    };
    let resp = auth::logout(&state, claims, body.refresh_token.as_deref()).await?;
    Ok(Json(resp))
}

/// `GET /api/auth/me`: the authenticated user's record.
pub async fn me_handler(State(state): State<AppState>, caller: Caller) -> AppResult<Json<UserDto>> {
    let resp = auth::me(&state, caller.claims()).await?;
    Ok(Json(resp))
}
