//! Patient service.

use clinica_core::access::Operation;
use clinica_core::models::auth::Claims;
use clinica_core::models::page::PageRequest;
use clinica_core::models::patient::{PatientChanges, PatientData, PatientFilter};
use clinica_core::validation::{age, cpf};
use tracing::info;

use super::within;
use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{AgeResponse, ListResponse, PatientDetail, PatientSummary};

pub async fn create(state: &AppState, claims: Option<&Claims>, input: &PatientData) -> AppResult<PatientDetail> {
    let deadline = state.config.store_timeout;
    let granted = within(deadline, state.patient_access.validate_create(claims, input)).await?;
    let patient = within(deadline, state.patients.create(&granted.value, granted.actor_id)).await?;
    info!(patient_id = patient.id, actor_id = granted.actor_id, "patient created");
    Ok(PatientDetail::from(patient))
}

pub async fn get(state: &AppState, claims: Option<&Claims>, id: i64) -> AppResult<PatientDetail> {
    let granted = within(state.config.store_timeout, state.patient_access.validate_read(claims, id)).await?;
    Ok(PatientDetail::from(granted.value))
}

pub async fn get_by_cpf(state: &AppState, claims: Option<&Claims>, raw: &str) -> AppResult<PatientDetail> {
    state.patient_access.authorize(claims, Operation::Read)?;
    let canonical = cpf::canonicalize(raw);
    if !cpf::validate(&canonical) {
        return Err(AppError::Validation("invalid CPF".into()));
    }
    let patient = within(state.config.store_timeout, state.patients.get_by_cpf(&canonical))
        .await?
        .ok_or_else(|| AppError::NotFound("patient not found".into()))?;
    Ok(PatientDetail::from(patient))
}

pub async fn age(state: &AppState, claims: Option<&Claims>, id: i64) -> AppResult<AgeResponse> {
    let granted = within(state.config.store_timeout, state.patient_access.validate_read(claims, id)).await?;
    let years = age::age(granted.value.data.birth_date);
    Ok(AgeResponse {
        id,
        idade: years,
        menor_de_idade: granted.value.data.birth_date.is_some() && years < age::ADULT_AGE,
    })
}

pub async fn list(
    state: &AppState,
    claims: Option<&Claims>,
    filter: &PatientFilter,
    page: PageRequest,
) -> AppResult<ListResponse<PatientSummary>> {
    state.patient_access.authorize(claims, Operation::Read)?;
    let page = within(state.config.store_timeout, state.patients.list(filter, page)).await?;
    Ok(ListResponse::from_page(page))
}

pub async fn search(
    state: &AppState,
    claims: Option<&Claims>,
    query: &str,
    page: PageRequest,
) -> AppResult<ListResponse<PatientSummary>> {
    state.patient_access.authorize(claims, Operation::Read)?;
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::Validation("search query is required".into()));
    }
    let page = within(state.config.store_timeout, state.patients.search(query, page)).await?;
    Ok(ListResponse::from_page(page))
}

pub async fn update(
    state: &AppState,
    claims: Option<&Claims>,
    id: i64,
    changes: &PatientChanges,
) -> AppResult<PatientDetail> {
    let deadline = state.config.store_timeout;
    let granted = within(deadline, state.patient_access.validate_update(claims, id, changes)).await?;
    let patient = within(deadline, state.patients.update(id, &granted.value, granted.actor_id)).await?;
    info!(patient_id = id, actor_id = granted.actor_id, "patient updated");
    Ok(PatientDetail::from(patient))
}

pub async fn update_diagnosis(
    state: &AppState,
    claims: Option<&Claims>,
    id: i64,
    diagnosis: &str,
) -> AppResult<PatientDetail> {
    // Authorization comes before input checks.
    state.patient_access.authorize(claims, Operation::Update)?;
    if diagnosis.trim().is_empty() {
        return Err(AppError::Validation("diagnosis is required".into()));
    }
    update(state, claims, id, &PatientChanges::diagnosis(diagnosis.trim())).await
}

pub async fn delete(state: &AppState, claims: Option<&Claims>, id: i64) -> AppResult<()> {
    let deadline = state.config.store_timeout;
    let granted = within(deadline, state.patient_access.validate_delete(claims, id)).await?;
    within(deadline, state.patients.soft_delete(id, granted.actor_id)).await?;
    info!(patient_id = id, actor_id = granted.actor_id, "patient deleted");
    Ok(())
}
