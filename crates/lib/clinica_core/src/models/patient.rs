//! Patient domain models.
//!
//! JSON field names follow the clinic's Portuguese API vocabulary; Rust and
//! SQL names are English.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Editable patient fields. Document fields hold canonical forms once they
/// have passed the access validator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(default)]
pub struct PatientData {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "data_nascimento")]
    pub birth_date: Option<NaiveDate>,
    #[serde(rename = "genero")]
    pub gender: String,
    pub cpf: String,
    pub rg: String,
    #[serde(rename = "diagnostico")]
    pub diagnosis: String,
    #[serde(rename = "telefone")]
    pub phone: String,
    pub email: String,
    #[serde(rename = "endereco")]
    pub address: String,
    #[serde(rename = "cidade")]
    pub city: String,
    #[serde(rename = "estado")]
    pub state: String,
    pub cep: String,
    #[serde(rename = "nome_responsavel")]
    pub guardian_name: String,
    #[serde(rename = "telefone_responsavel")]
    pub guardian_phone: String,
    #[serde(rename = "email_responsavel")]
    pub guardian_email: String,
    #[serde(rename = "observacoes")]
    pub notes: String,
    #[serde(rename = "alergias")]
    pub allergies: String,
    #[serde(rename = "medicacoes")]
    pub medications: String,
}

/// A stored patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Patient {
    pub id: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub data: PatientData,
    #[serde(rename = "criado_em")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "criado_por")]
    pub created_by: i64,
    #[serde(rename = "atualizado_em")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "atualizado_por")]
    pub updated_by: i64,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub deleted_by: Option<i64>,
}

impl Patient {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Partial update: `None` (or an empty string) keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PatientChanges {
    #[serde(rename = "nome")]
    pub name: Option<String>,
    #[serde(rename = "data_nascimento")]
    pub birth_date: Option<NaiveDate>,
    #[serde(rename = "genero")]
    pub gender: Option<String>,
    pub cpf: Option<String>,
    pub rg: Option<String>,
    #[serde(rename = "diagnostico")]
    pub diagnosis: Option<String>,
    #[serde(rename = "telefone")]
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "endereco")]
    pub address: Option<String>,
    #[serde(rename = "cidade")]
    pub city: Option<String>,
    #[serde(rename = "estado")]
    pub state: Option<String>,
    pub cep: Option<String>,
    #[serde(rename = "nome_responsavel")]
    pub guardian_name: Option<String>,
    #[serde(rename = "telefone_responsavel")]
    pub guardian_phone: Option<String>,
    #[serde(rename = "email_responsavel")]
    pub guardian_email: Option<String>,
    #[serde(rename = "observacoes")]
    pub notes: Option<String>,
    #[serde(rename = "alergias")]
    pub allergies: Option<String>,
    #[serde(rename = "medicacoes")]
    pub medications: Option<String>,
}

impl PatientChanges {
    /// A change that only touches the diagnosis.
    pub fn diagnosis(diagnosis: impl Into<String>) -> Self {
        Self {
            diagnosis: Some(diagnosis.into()),
            ..Self::default()
        }
    }

    /// Overlay the provided, non-empty fields onto `base`.
    pub fn apply(&self, base: &PatientData) -> PatientData {
        fn pick(new: &Option<String>, old: &str) -> String {
            match new {
                Some(v) if !v.trim().is_empty() => v.clone(),
                _ => old.to_string(),
            }
        }

        PatientData {
            name: pick(&self.name, &base.name),
            birth_date: self.birth_date.or(base.birth_date),
            gender: pick(&self.gender, &base.gender),
            cpf: pick(&self.cpf, &base.cpf),
            rg: pick(&self.rg, &base.rg),
            diagnosis: pick(&self.diagnosis, &base.diagnosis),
            phone: pick(&self.phone, &base.phone),
            email: pick(&self.email, &base.email),
            address: pick(&self.address, &base.address),
            city: pick(&self.city, &base.city),
            state: pick(&self.state, &base.state),
            cep: pick(&self.cep, &base.cep),
            guardian_name: pick(&self.guardian_name, &base.guardian_name),
            guardian_phone: pick(&self.guardian_phone, &base.guardian_phone),
            guardian_email: pick(&self.guardian_email, &base.guardian_email),
            notes: pick(&self.notes, &base.notes),
            allergies: pick(&self.allergies, &base.allergies),
            medications: pick(&self.medications, &base.medications),
        }
    }
}

/// Column filters for patient listings. All present filters must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PatientFilter {
    /// Case-insensitive substring of the name.
    #[serde(rename = "nome")]
    pub name: Option<String>,
    /// Exact CPF (any punctuation).
    pub cpf: Option<String>,
    /// Case-insensitive substring of the diagnosis.
    #[serde(rename = "diagnostico")]
    pub diagnosis: Option<String>,
    #[serde(rename = "genero")]
    pub gender: Option<String>,
    #[serde(rename = "cidade")]
    pub city: Option<String>,
    #[serde(rename = "estado")]
    pub state: Option<String>,
    #[serde(rename = "criado_por")]
    pub created_by: Option<i64>,
}

/// Columns that can be checked for uniqueness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatientField {
    Cpf,
}

impl PatientField {
    pub fn column(&self) -> &'static str {
        match self {
            PatientField::Cpf => "cpf",
        }
    }
}
