//! Request and response bodies.

use chrono::{DateTime, NaiveDate, Utc};
use clinica_core::models::page::{Page, PageRequest};
use clinica_core::models::patient::{Patient, PatientFilter};
use clinica_core::models::user::{User, UserFilter};
use clinica_core::validation::{age, cep, cpf, phone, rg};
use serde::{Deserialize, Serialize};

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

// -- auth --

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    #[serde(alias = "password")]
    pub senha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserDto,
}

// -- users --

/// A user as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct UserDto {
    pub id: i64,
    pub nome: String,
    pub email: String,
    pub perfil: String,
    pub permissoes: Vec<String>,
    pub escopos: Vec<String>,
    pub ativo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_inicio_inatividade: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_fim_inatividade: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motivo_inatividade: Option<String>,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

impl From<User> for UserDto {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            nome: u.name,
            email: u.email,
            perfil: u.role,
            permissoes: u.permissions,
            escopos: u.scopes,
            ativo: u.active,
            data_inicio_inatividade: u.inactive_from,
            data_fim_inatividade: u.inactive_until,
            motivo_inatividade: u.inactive_reason,
            criado_em: u.created_at,
            atualizado_em: u.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordChangeRequest {
    #[serde(default)]
    pub senha_atual: Option<String>,
    pub nova_senha: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListQuery {
    pub nome: Option<String>,
    pub perfil: Option<String>,
    pub ativo: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl UserListQuery {
    pub fn into_parts(self) -> (UserFilter, PageRequest) {
        (
            UserFilter {
                name: self.nome,
                role: self.perfil,
                active: self.ativo,
            },
            PageRequest::new(self.page, self.limit),
        )
    }
}

// -- patients --

/// Patient list entry, with display-formatted documents and computed age.
#[derive(Debug, Clone, Serialize)]
pub struct PatientSummary {
    pub id: i64,
    pub nome: String,
    pub data_nascimento: Option<NaiveDate>,
    pub idade: u32,
    pub genero: String,
    pub cpf: String,
    pub telefone: String,
    pub diagnostico: String,
    pub criado_em: DateTime<Utc>,
    pub criado_por: i64,
}

impl From<Patient> for PatientSummary {
    fn from(p: Patient) -> Self {
        Self {
            id: p.id,
            idade: age::age(p.data.birth_date),
            data_nascimento: p.data.birth_date,
            cpf: cpf::format(&p.data.cpf),
            telefone: phone::format(&p.data.phone),
            nome: p.data.name,
            genero: p.data.gender,
            diagnostico: p.data.diagnosis,
            criado_em: p.created_at,
            criado_por: p.created_by,
        }
    }
}

/// Full patient record.
#[derive(Debug, Clone, Serialize)]
pub struct PatientDetail {
    pub id: i64,
    pub nome: String,
    pub data_nascimento: Option<NaiveDate>,
    pub idade: u32,
    pub genero: String,
    pub cpf: String,
    pub rg: String,
    pub diagnostico: String,
    pub telefone: String,
    pub email: String,
    pub endereco: String,
    pub cidade: String,
    pub estado: String,
    pub cep: String,
    pub nome_responsavel: String,
    pub telefone_responsavel: String,
    pub email_responsavel: String,
    pub observacoes: String,
    pub alergias: String,
    pub medicacoes: String,
    pub criado_em: DateTime<Utc>,
    pub criado_por: i64,
    pub atualizado_em: DateTime<Utc>,
    pub atualizado_por: i64,
}

impl From<Patient> for PatientDetail {
    fn from(p: Patient) -> Self {
        let d = p.data;
        Self {
            id: p.id,
            idade: age::age(d.birth_date),
            data_nascimento: d.birth_date,
            cpf: cpf::format(&d.cpf),
            rg: rg::format(&d.rg),
            telefone: phone::format(&d.phone),
            cep: cep::format(&d.cep),
            telefone_responsavel: phone::format(&d.guardian_phone),
            nome: d.name,
            genero: d.gender,
            diagnostico: d.diagnosis,
            email: d.email,
            endereco: d.address,
            cidade: d.city,
            estado: d.state,
            nome_responsavel: d.guardian_name,
            email_responsavel: d.guardian_email,
            observacoes: d.notes,
            alergias: d.allergies,
            medicacoes: d.medications,
            criado_em: p.created_at,
            criado_por: p.created_by,
            atualizado_em: p.updated_at,
            atualizado_por: p.updated_by,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgeResponse {
    pub id: i64,
    pub idade: u32,
    pub menor_de_idade: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosisRequest {
    pub diagnostico: String,
}

/// Patient list query string. Filters and paging live side by side.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientListQuery {
    pub nome: Option<String>,
    pub cpf: Option<String>,
    pub diagnostico: Option<String>,
    pub genero: Option<String>,
    pub cidade: Option<String>,
    pub estado: Option<String>,
    pub criado_por: Option<i64>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PatientListQuery {
    pub fn into_parts(self) -> (PatientFilter, PageRequest) {
        (
            PatientFilter {
                name: self.nome,
                cpf: self.cpf,
                diagnosis: self.diagnostico,
                gender: self.genero,
                city: self.cidade,
                state: self.estado,
                created_by: self.criado_por,
            },
            PageRequest::new(self.page, self.limit),
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// -- paging --

#[derive(Debug, Clone, Serialize)]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> ListResponse<T> {
    pub fn from_page<S>(page: Page<S>) -> Self
    where
        T: From<S>,
    {
        let meta = PageMeta {
            total: page.total,
            page: page.request.page,
            per_page: page.request.limit,
            total_pages: page.total_pages(),
        };
        Self {
            data: page.items.into_iter().map(T::from).collect(),
            meta,
        }
    }
}

// -- health --

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
}
