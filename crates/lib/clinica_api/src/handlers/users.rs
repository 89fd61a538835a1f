//! User management request handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use clinica_core::models::page::PageRequest;
use clinica_core::models::user::{CreateUser, UserChanges};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::Caller;
use crate::models::{ListResponse, PasswordChangeRequest, SearchQuery, UserDto, UserListQuery};
use crate::services::users;

/// `GET /api/usuarios`
pub async fn list_handler(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<UserListQuery>,
) -> AppResult<Json<ListResponse<UserDto>>> {
    let (filter, page) = query.into_parts();
    let resp = users::list(&state, caller.claims(), &filter, page).await?;
    Ok(Json(resp))
}

/// `GET /api/usuarios/search?q=`
pub async fn search_handler(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<ListResponse<UserDto>>> {
    let page = PageRequest::new(query.page, query.limit);
    let resp = users::search(&state, caller.claims(), &query.q, page).await?;
    Ok(Json(resp))
}

/// `GET /api/usuarios/{id}`
pub async fn get_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
) -> AppResult<Json<UserDto>> {
    let resp = users::get(&state, caller.claims(), id).await?;
    Ok(Json(resp))
}

/// `POST /api/usuarios`
pub async fn create_handler(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<UserDto>)> {
    let resp = users::create(&state, caller.claims(), &body).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

/// `PUT /api/usuarios/{id}`
pub async fn update_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
    Json(body): Json<UserChanges>,
) -> AppResult<Json<UserDto>> {
    let resp = users::update(&state, caller.claims(), id, &body).await?;
    Ok(Json(resp))
}

/// `PUT /api/usuarios/{id}/senha`: self-service or privileged password change.
pub async fn change_password_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
    Json(body): Json<PasswordChangeRequest>,
) -> AppResult<StatusCode> {
    users::change_password(&state, caller.claims(), id, body.senha_atual.as_deref(), &body.nova_senha).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/usuarios/{id}`: soft delete.
pub async fn delete_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    users::delete(&state, caller.claims(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
