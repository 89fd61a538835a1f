//! In-memory stores for tests and `--in-memory` runs.
//!
//! Mirror the Postgres semantics: name ordering, soft delete, and uniqueness
//! scoped to live rows.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{PatientStore, StoreError, UserStore};
use crate::models::page::{Page, PageRequest};
use crate::models::patient::{Patient, PatientData, PatientField, PatientFilter};
use crate::models::user::{NewUser, User, UserField, UserFilter};
use crate::validation::{cpf, digits_only};

struct Table<T> {
    rows: BTreeMap<i64, T>,
    last_id: i64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            last_id: 0,
        }
    }
}

impl<T> Table<T> {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn paginate<T>(mut rows: Vec<T>, request: PageRequest) -> Page<T> {
    let total = rows.len() as u64;
    let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
    let items = if offset >= rows.len() {
        Vec::new()
    } else {
        rows.drain(offset..).take(request.limit as usize).collect()
    };
    Page { items, total, request }
}

fn sort_by_name<T>(rows: &mut [T], key: impl Fn(&T) -> (String, i64)) {
    rows.sort_by_key(|row| key(row));
}

// -- patients --

#[derive(Default)]
pub struct MemoryPatientStore {
    table: RwLock<Table<Patient>>,
}

impl MemoryPatientStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn cpf_taken(table: &Table<Patient>, cpf: &str, exclude_id: Option<i64>) -> bool {
        !cpf.is_empty()
            && table
                .rows
                .values()
                .any(|p| !p.is_deleted() && p.data.cpf == cpf && Some(p.id) != exclude_id)
    }

    fn live_sorted(table: &Table<Patient>, keep: impl Fn(&Patient) -> bool) -> Vec<Patient> {
        let mut rows: Vec<Patient> = table
            .rows
            .values()
            .filter(|p| !p.is_deleted() && keep(p))
            .cloned()
            .collect();
        sort_by_name(&mut rows, |p| (p.data.name.to_lowercase(), p.id));
        rows
    }
}

fn matches_filter(p: &Patient, filter: &PatientFilter) -> bool {
    let d = &p.data;
    filter.name.as_deref().is_none_or(|v| contains_ci(&d.name, v))
        && filter
            .cpf
            .as_deref()
            .is_none_or(|v| d.cpf == cpf::canonicalize(v))
        && filter
            .diagnosis
            .as_deref()
            .is_none_or(|v| contains_ci(&d.diagnosis, v))
        && filter
            .gender
            .as_deref()
            .is_none_or(|v| d.gender.eq_ignore_ascii_case(v))
        && filter.city.as_deref().is_none_or(|v| contains_ci(&d.city, v))
        && filter
            .state
            .as_deref()
            .is_none_or(|v| d.state.eq_ignore_ascii_case(v))
        && filter.created_by.is_none_or(|v| p.created_by == v)
}

fn matches_search(p: &Patient, query: &str) -> bool {
    let d = &p.data;
    let digits = digits_only(query);
    [&d.name, &d.cpf, &d.email, &d.phone, &d.diagnosis]
        .iter()
        .any(|field| contains_ci(field, query))
        || (!digits.is_empty() && (d.cpf.contains(&digits) || d.phone.contains(&digits)))
}

#[async_trait]
impl PatientStore for MemoryPatientStore {
    async fn create(&self, data: &PatientData, actor_id: i64) -> Result<Patient, StoreError> {
        let mut table = self.table.write().await;
        if Self::cpf_taken(&table, &data.cpf, None) {
            return Err(StoreError::Duplicate("cpf".into()));
        }
        let now = Utc::now();
        let patient = Patient {
            id: table.next_id(),
            data: data.clone(),
            created_at: now,
            created_by: actor_id,
            updated_at: now,
            updated_by: actor_id,
            deleted_at: None,
            deleted_by: None,
        };
        table.rows.insert(patient.id, patient.clone());
        Ok(patient)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Patient>, StoreError> {
        let table = self.table.read().await;
        Ok(table.rows.get(&id).filter(|p| !p.is_deleted()).cloned())
    }

    async fn get_by_cpf(&self, cpf: &str) -> Result<Option<Patient>, StoreError> {
        if cpf.is_empty() {
            return Ok(None);
        }
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .find(|p| !p.is_deleted() && p.data.cpf == cpf)
            .cloned())
    }

    async fn update(&self, id: i64, data: &PatientData, actor_id: i64) -> Result<Patient, StoreError> {
        let mut table = self.table.write().await;
        if Self::cpf_taken(&table, &data.cpf, Some(id)) {
            return Err(StoreError::Duplicate("cpf".into()));
        }
        let patient = table
            .rows
            .get_mut(&id)
            .filter(|p| !p.is_deleted())
            .ok_or_else(|| StoreError::NotFound(format!("patient {id}")))?;
        patient.data = data.clone();
        patient.updated_at = Utc::now();
        patient.updated_by = actor_id;
        Ok(patient.clone())
    }

    async fn soft_delete(&self, id: i64, actor_id: i64) -> Result<(), StoreError> {
        let mut table = self.table.write().await;
        let patient = table
            .rows
            .get_mut(&id)
            .filter(|p| !p.is_deleted())
            .ok_or_else(|| StoreError::NotFound(format!("patient {id}")))?;
        patient.deleted_at = Some(Utc::now());
        patient.deleted_by = Some(actor_id);
        Ok(())
    }

    async fn list(&self, filter: &PatientFilter, page: PageRequest) -> Result<Page<Patient>, StoreError> {
        let table = self.table.read().await;
        Ok(paginate(
            Self::live_sorted(&table, |p| matches_filter(p, filter)),
            page,
        ))
    }

    async fn search(&self, query: &str, page: PageRequest) -> Result<Page<Patient>, StoreError> {
        let query = query.trim();
        let table = self.table.read().await;
        Ok(paginate(
            Self::live_sorted(&table, |p| matches_search(p, query)),
            page,
        ))
    }

    async fn exists_by_field(
        &self,
        field: PatientField,
        value: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, StoreError> {
        let table = self.table.read().await;
        Ok(match field {
            PatientField::Cpf => Self::cpf_taken(&table, value, exclude_id),
        })
    }
}

// -- users --

#[derive(Default)]
pub struct MemoryUserStore {
    table: RwLock<Table<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn email_taken(table: &Table<User>, email: &str, exclude_id: Option<i64>) -> bool {
        table.rows.values().any(|u| {
            u.deleted_at.is_none() && u.email.eq_ignore_ascii_case(email) && Some(u.id) != exclude_id
        })
    }

    fn live_sorted(table: &Table<User>, keep: impl Fn(&User) -> bool) -> Vec<User> {
        let mut rows: Vec<User> = table
            .rows
            .values()
            .filter(|u| u.deleted_at.is_none() && keep(u))
            .cloned()
            .collect();
        sort_by_name(&mut rows, |u| (u.name.to_lowercase(), u.id));
        rows
    }

    fn live_mut(table: &mut Table<User>, id: i64) -> Result<&mut User, StoreError> {
        table
            .rows
            .get_mut(&id)
            .filter(|u| u.deleted_at.is_none())
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new: &NewUser) -> Result<User, StoreError> {
        let mut table = self.table.write().await;
        if Self::email_taken(&table, &new.email, None) {
            return Err(StoreError::Duplicate("email".into()));
        }
        let now = Utc::now();
        let user = User {
            id: table.next_id(),
            name: new.name.clone(),
            email: new.email.clone(),
            password_hash: new.password_hash.clone(),
            role: new.role.clone(),
            permissions: new.permissions.clone(),
            scopes: new.scopes.clone(),
            active: true,
            inactive_from: None,
            inactive_until: None,
            inactive_reason: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            deleted_by: None,
        };
        table.rows.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let table = self.table.read().await;
        Ok(table.rows.get(&id).filter(|u| u.deleted_at.is_none()).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .find(|u| u.deleted_at.is_none() && u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let mut table = self.table.write().await;
        if Self::email_taken(&table, &user.email, Some(user.id)) {
            return Err(StoreError::Duplicate("email".into()));
        }
        let stored = Self::live_mut(&mut table, user.id)?;
        let password_hash = std::mem::take(&mut stored.password_hash);
        *stored = User {
            password_hash,
            created_at: stored.created_at,
            updated_at: Utc::now(),
            deleted_at: None,
            deleted_by: None,
            ..user.clone()
        };
        Ok(stored.clone())
    }

    async fn set_password(&self, id: i64, password_hash: &str) -> Result<(), StoreError> {
        let mut table = self.table.write().await;
        let stored = Self::live_mut(&mut table, id)?;
        stored.password_hash = password_hash.to_string();
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn soft_delete(&self, id: i64, actor_id: i64) -> Result<(), StoreError> {
        let mut table = self.table.write().await;
        let stored = Self::live_mut(&mut table, id)?;
        stored.active = false;
        stored.deleted_at = Some(Utc::now());
        stored.deleted_by = Some(actor_id);
        Ok(())
    }

    async fn list(&self, filter: &UserFilter, page: PageRequest) -> Result<Page<User>, StoreError> {
        let table = self.table.read().await;
        let rows = Self::live_sorted(&table, |u| {
            filter.name.as_deref().is_none_or(|v| contains_ci(&u.name, v))
                && filter.role.as_deref().is_none_or(|v| u.role == v)
                && filter.active.is_none_or(|v| u.active == v)
        });
        Ok(paginate(rows, page))
    }

    async fn search(&self, query: &str, page: PageRequest) -> Result<Page<User>, StoreError> {
        let query = query.trim();
        let table = self.table.read().await;
        let rows = Self::live_sorted(&table, |u| {
            contains_ci(&u.name, query) || contains_ci(&u.email, query)
        });
        Ok(paginate(rows, page))
    }

    async fn exists_by_field(
        &self,
        field: UserField,
        value: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, StoreError> {
        let table = self.table.read().await;
        Ok(match field {
            UserField::Email => Self::email_taken(&table, value, exclude_id),
        })
    }

    async fn any_with_role(&self, role: &str) -> Result<bool, StoreError> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .any(|u| u.deleted_at.is_none() && u.role == role))
    }
}
