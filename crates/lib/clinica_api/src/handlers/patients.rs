//! Patient request handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use clinica_core::models::page::PageRequest;
use clinica_core::models::patient::{PatientChanges, PatientData};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::Caller;
use crate::models::{
    AgeResponse, DiagnosisRequest, ListResponse, PatientDetail, PatientListQuery, PatientSummary, SearchQuery,
};
use crate::services::patients;

/// `GET /api/pacientes`: filtered, paginated list.
pub async fn list_handler(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<PatientListQuery>,
) -> AppResult<Json<ListResponse<PatientSummary>>> {
    let (filter, page) = query.into_parts();
    let resp = patients::list(&state, caller.claims(), &filter, page).await?;
    Ok(Json(resp))
}

/// `GET /api/pacientes/search?q=`: free-text search.
pub async fn search_handler(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<ListResponse<PatientSummary>>> {
    let page = PageRequest::new(query.page, query.limit);
    let resp = patients::search(&state, caller.claims(), &query.q, page).await?;
    Ok(Json(resp))
}

/// `GET /api/pacientes/cpf/{cpf}`: lookup by CPF, punctuated or not.
pub async fn get_by_cpf_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(cpf): Path<String>,
) -> AppResult<Json<PatientDetail>> {
    let resp = patients::get_by_cpf(&state, caller.claims(), &cpf).await?;
    Ok(Json(resp))
}

/// `GET /api/pacientes/{id}`
pub async fn get_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
) -> AppResult<Json<PatientDetail>> {
    let resp = patients::get(&state, caller.claims(), id).await?;
    Ok(Json(resp))
}

/// `GET /api/pacientes/{id}/idade`: age and minor flag.
pub async fn age_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
) -> AppResult<Json<AgeResponse>> {
    let resp = patients::age(&state, caller.claims(), id).await?;
    Ok(Json(resp))
}

/// `POST /api/pacientes`
pub async fn create_handler(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<PatientData>,
) -> AppResult<(StatusCode, Json<PatientDetail>)> {
    let resp = patients::create(&state, caller.claims(), &body).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

/// `PUT /api/pacientes/{id}`: partial update; omitted fields are kept.
pub async fn update_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
    Json(body): Json<PatientChanges>,
) -> AppResult<Json<PatientDetail>> {
    let resp = patients::update(&state, caller.claims(), id, &body).await?;
    Ok(Json(resp))
}

/// `PATCH /api/pacientes/{id}/diagnostico`
pub async fn update_diagnosis_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
    Json(body): Json<DiagnosisRequest>,
) -> AppResult<Json<PatientDetail>> {
    let resp = patients::update_diagnosis(&state, caller.claims(), id, &body.diagnostico).await?;
    Ok(Json(resp))
}

/// `DELETE /api/pacientes/{id}`: soft delete.
pub async fn delete_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    patients::delete(&state, caller.claims(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
