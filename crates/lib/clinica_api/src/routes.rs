//! Route paths served by [`crate::router`].

pub const GET_HEALTH: &str = "/health";

pub const POST_AUTH_LOGIN: &str = "/api/auth/login";
pub const POST_AUTH_REFRESH: &str = "/api/auth/refresh-token";
pub const POST_AUTH_LOGOUT: &str = "/api/auth/logout";
pub const GET_AUTH_ME: &str = "/api/auth/me";

pub const PATIENTS: &str = "/api/pacientes";
pub const PATIENTS_SEARCH: &str = "/api/pacientes/search";
pub const PATIENTS_BY_CPF: &str = "/api/pacientes/cpf/{cpf}";
pub const PATIENTS_ID: &str = "/api/pacientes/{id}";
pub const PATIENTS_ID_AGE: &str = "/api/pacientes/{id}/idade";
pub const PATIENTS_ID_DIAGNOSIS: &str = "/api/pacientes/{id}/diagnostico";

pub const USERS: &str = "/api/usuarios";
pub const USERS_SEARCH: &str = "/api/usuarios/search";
pub const USERS_ID: &str = "/api/usuarios/{id}";
pub const USERS_ID_PASSWORD: &str = "/api/usuarios/{id}/senha";
