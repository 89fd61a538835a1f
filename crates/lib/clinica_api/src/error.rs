//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use clinica_core::access::AccessError;
use clinica_core::auth::{AuthError, TokenError};
use clinica_core::store::StoreError;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, "conflict", m.as_str()),
            AppError::Internal(detail) => {
                error!(%detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<AccessError> for AppError {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::Unauthorized => AppError::Unauthorized("Authentication required".into()),
            AccessError::Forbidden(permission) => {
                AppError::Forbidden(format!("Missing permission: {permission}"))
            }
            AccessError::InvalidInput(msg) => AppError::Validation(msg),
            AccessError::DuplicateResource(msg) => AppError::Conflict(msg),
            AccessError::NotFound(msg) => AppError::NotFound(msg),
            AccessError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Invalid | TokenError::Expired | TokenError::Revoked => {
                AppError::Unauthorized(e.to_string())
            }
            TokenError::Signing(msg) | TokenError::Store(msg) => AppError::Internal(msg),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::CredentialError => AppError::Unauthorized("Invalid credentials".into()),
            AuthError::Token(e) => AppError::from(e),
            AuthError::ValidationError(msg) => AppError::Validation(msg),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::from(AccessError::from(e))
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn access_errors_map_to_status_codes() {
        let cases = [
            (AccessError::Unauthorized, StatusCode::UNAUTHORIZED),
            (AccessError::Forbidden("pacientes:delete".into()), StatusCode::FORBIDDEN),
            (AccessError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AccessError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (AccessError::DuplicateResource("x".into()), StatusCode::CONFLICT),
            (AccessError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            let (status, _) = render(err.into()).await;
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn token_errors_collapse_to_unauthorized() {
        for err in [TokenError::Invalid, TokenError::Expired, TokenError::Revoked] {
            let (status, body) = render(err.into()).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["error"], "unauthorized");
        }
    }

    #[tokio::test]
    async fn internal_errors_hide_detail() {
        let (status, body) = render(AppError::Internal("pool timed out: secret dsn".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal_error");
        assert_eq!(body["message"], "Internal server error");
    }
}
