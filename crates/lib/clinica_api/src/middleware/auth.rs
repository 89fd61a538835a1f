//! Authentication middleware: bearer token extraction and verification.
//!
//! The middleware only establishes who is calling. Whether the caller may do
//! what they ask is decided by the access validators, which receive the
//! claims through the [`Caller`] extractor.

use std::convert::Infallible;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use clinica_core::models::auth::Claims;

use crate::AppState;
use crate::error::AppError;

/// Key used to store verified `Claims` in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Claims);

/// Axum middleware: when an `Authorization` header is present it must carry
/// a valid, unrevoked `Bearer` token; the claims are then injected as
/// [`AuthenticatedUser`]. Requests without the header pass through
/// anonymously.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(header) = request.headers().get(AUTHORIZATION) else {
        return Ok(next.run(request).await);
    };

    let token = header
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))?;

    let claims = state.tokens.authenticate(token).await?;
    request.extensions_mut().insert(AuthenticatedUser(claims));

    Ok(next.run(request).await)
}

/// The verified caller, if any.
#[derive(Debug, Clone)]
pub struct Caller(pub Option<Claims>);

impl Caller {
    pub fn claims(&self) -> Option<&Claims> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Caller(
            parts
                .extensions
                .get::<AuthenticatedUser>()
                .map(|user| user.0.clone()),
        ))
    }
}
