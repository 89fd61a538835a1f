//! # clinica_api
//!
//! HTTP API library for the clinic backend.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post, put};
use clinica_core::access::patient::PatientAccessValidator;
use clinica_core::access::user::UserAccessValidator;
use clinica_core::auth::TokenError;
use clinica_core::auth::jwt::TokenService;
use clinica_core::auth::revocation::RevocationStore;
use clinica_core::store::{PatientStore, UserStore};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{auth, health, patients, users};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: ApiConfig,
    pub patients: Arc<dyn PatientStore>,
    pub users: Arc<dyn UserStore>,
    /// Token issuing, verification and revocation.
    pub tokens: Arc<TokenService>,
    pub patient_access: PatientAccessValidator,
    pub user_access: UserAccessValidator,
}

impl AppState {
    /// Wires the token service and access validators around the given stores.
    pub fn new(
        config: ApiConfig,
        patients: Arc<dyn PatientStore>,
        users: Arc<dyn UserStore>,
        revocations: Arc<dyn RevocationStore>,
    ) -> Result<Self, TokenError> {
        let tokens = Arc::new(TokenService::new(config.token_config(), revocations)?);
        Ok(Self {
            patient_access: PatientAccessValidator::new(patients.clone()),
            user_access: UserAccessValidator::new(users.clone()),
            config,
            patients,
            users,
            tokens,
        })
    }
}

/// Run embedded database migrations.
///
/// Delegates to `clinica_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    clinica_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no token parsing)
    let public = Router::new()
        .route(routes::GET_HEALTH, get(health::health_handler))
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_REFRESH, post(auth::refresh_handler));

    // Token-aware routes; access checks happen in the validators.
    let protected = Router::new()
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler))
        .route(routes::GET_AUTH_ME, get(auth::me_handler))
        .route(
            routes::PATIENTS,
            get(patients::list_handler).post(patients::create_handler),
        )
        .route(routes::PATIENTS_SEARCH, get(patients::search_handler))
        .route(routes::PATIENTS_BY_CPF, get(patients::get_by_cpf_handler))
        .route(
            routes::PATIENTS_ID,
            get(patients::get_handler)
                .put(patients::update_handler)
                .delete(patients::delete_handler),
        )
        .route(routes::PATIENTS_ID_AGE, get(patients::age_handler))
        .route(
            routes::PATIENTS_ID_DIAGNOSIS,
            patch(patients::update_diagnosis_handler),
        )
        .route(
            routes::USERS,
            get(users::list_handler).post(users::create_handler),
        )
        .route(routes::USERS_SEARCH, get(users::search_handler))
        .route(
            routes::USERS_ID,
            get(users::get_handler)
                .put(users::update_handler)
                .delete(users::delete_handler),
        )
        .route(routes::USERS_ID_PASSWORD, put(users::change_password_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
