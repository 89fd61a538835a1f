//! Postgres-backed stores.
//!
//! Live-row uniqueness is enforced by partial unique indexes (see
//! `migrations/0001_init.sql`); a unique violation surfaces as
//! `StoreError::Duplicate`.

use async_trait::async_trait;
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use super::{PatientStore, StoreError, UserStore};
use crate::models::page::{Page, PageRequest};
use crate::models::patient::{Patient, PatientData, PatientField, PatientFilter};
use crate::models::user::{NewUser, User, UserField, UserFilter};
use crate::validation::{cpf, digits_only};

const PATIENT_COLUMNS: &str = "id, name, birth_date, gender, cpf, rg, diagnosis, phone, email, \
     address, city, state, cep, guardian_name, guardian_phone, guardian_email, notes, allergies, \
     medications, created_at, created_by, updated_at, updated_by, deleted_at, deleted_by";

const USER_COLUMNS: &str = "id, name, email, password_hash, role, permissions, scopes, active, \
     inactive_from, inactive_until, inactive_reason, created_at, updated_at, deleted_at, deleted_by";

/// `%value%` with LIKE metacharacters escaped.
fn like_pattern(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn write_error(e: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &e
        && db.is_unique_violation()
    {
        debug!(constraint = db.constraint().unwrap_or("unknown"), what, "unique violation");
        return StoreError::Duplicate(what.to_string());
    }
    StoreError::DbError(e)
}

fn limit_offset(page: PageRequest) -> (i64, i64) {
    (
        i64::from(page.limit),
        i64::try_from(page.offset()).unwrap_or(i64::MAX),
    )
}

fn to_page<T>(items: Vec<T>, total: i64, request: PageRequest) -> Page<T> {
    Page {
        items,
        total: u64::try_from(total).unwrap_or(0),
        request,
    }
}

// -- patients --

#[derive(Clone)]
pub struct PgPatientStore {
    pool: PgPool,
}

impl PgPatientStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn bind_patient_data<'q, O>(
    query: QueryAs<'q, Postgres, O, PgArguments>,
    data: &'q PatientData,
) -> QueryAs<'q, Postgres, O, PgArguments> {
    query
        .bind(data.name.as_str())
        .bind(data.birth_date)
        .bind(data.gender.as_str())
        .bind(data.cpf.as_str())
        .bind(data.rg.as_str())
        .bind(data.diagnosis.as_str())
        .bind(data.phone.as_str())
        .bind(data.email.as_str())
        .bind(data.address.as_str())
        .bind(data.city.as_str())
        .bind(data.state.as_str())
        .bind(data.cep.as_str())
        .bind(data.guardian_name.as_str())
        .bind(data.guardian_phone.as_str())
        .bind(data.guardian_email.as_str())
        .bind(data.notes.as_str())
        .bind(data.allergies.as_str())
        .bind(data.medications.as_str())
}

fn push_patient_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &PatientFilter) {
    if let Some(name) = filter.name.as_deref().filter(|v| !v.is_empty()) {
        qb.push(" AND name ILIKE ").push_bind(like_pattern(name));
    }
    if let Some(value) = filter.cpf.as_deref().filter(|v| !v.is_empty()) {
        qb.push(" AND cpf = ").push_bind(cpf::canonicalize(value));
    }
    if let Some(diagnosis) = filter.diagnosis.as_deref().filter(|v| !v.is_empty()) {
        qb.push(" AND diagnosis ILIKE ")
            .push_bind(like_pattern(diagnosis));
    }
    if let Some(gender) = filter.gender.as_deref().filter(|v| !v.is_empty()) {
        qb.push(" AND lower(gender) = lower(")
            .push_bind(gender.to_string())
            .push(")");
    }
    if let Some(city) = filter.city.as_deref().filter(|v| !v.is_empty()) {
        qb.push(" AND city ILIKE ").push_bind(like_pattern(city));
    }
    if let Some(state) = filter.state.as_deref().filter(|v| !v.is_empty()) {
        qb.push(" AND upper(state) = upper(")
            .push_bind(state.to_string())
            .push(")");
    }
    if let Some(created_by) = filter.created_by {
        qb.push(" AND created_by = ").push_bind(created_by);
    }
}

#[async_trait]
impl PatientStore for PgPatientStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create(&self, data: &PatientData, actor_id: i64) -> Result<Patient, StoreError> {
        let sql = format!(
            "INSERT INTO patients (name, birth_date, gender, cpf, rg, diagnosis, phone, email, \
             address, city, state, cep, guardian_name, guardian_phone, guardian_email, notes, \
             allergies, medications, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $19) \
             RETURNING {PATIENT_COLUMNS}"
        );
        bind_patient_data(sqlx::query_as::<_, Patient>(&sql), data)
            .bind(actor_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| write_error(e, "cpf"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Patient>, StoreError> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = $1 AND deleted_at IS NULL");
        let row = sqlx::query_as::<_, Patient>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_by_cpf(&self, cpf: &str) -> Result<Option<Patient>, StoreError> {
        if cpf.is_empty() {
            return Ok(None);
        }
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE cpf = $1 AND deleted_at IS NULL");
        let row = sqlx::query_as::<_, Patient>(&sql)
            .bind(cpf)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn update(&self, id: i64, data: &PatientData, actor_id: i64) -> Result<Patient, StoreError> {
        let sql = format!(
            "UPDATE patients SET name = $1, birth_date = $2, gender = $3, cpf = $4, rg = $5, \
             diagnosis = $6, phone = $7, email = $8, address = $9, city = $10, state = $11, \
             cep = $12, guardian_name = $13, guardian_phone = $14, guardian_email = $15, \
             notes = $16, allergies = $17, medications = $18, updated_by = $19, updated_at = now() \
             WHERE id = $20 AND deleted_at IS NULL \
             RETURNING {PATIENT_COLUMNS}"
        );
        bind_patient_data(sqlx::query_as::<_, Patient>(&sql), data)
            .bind(actor_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| write_error(e, "cpf"))?
            .ok_or_else(|| StoreError::NotFound(format!("patient {id}")))
    }

    async fn soft_delete(&self, id: i64, actor_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE patients SET deleted_at = now(), deleted_by = $2 \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(actor_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("patient {id}")));
        }
        Ok(())
    }

    async fn list(&self, filter: &PatientFilter, page: PageRequest) -> Result<Page<Patient>, StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM patients WHERE deleted_at IS NULL");
        push_patient_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let (limit, offset) = limit_offset(page);
        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE deleted_at IS NULL"
        ));
        push_patient_filters(&mut select, filter);
        select
            .push(" ORDER BY lower(name), id LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let items = select
            .build_query_as::<Patient>()
            .fetch_all(&self.pool)
            .await?;

        Ok(to_page(items, total, page))
    }

    async fn search(&self, query: &str, page: PageRequest) -> Result<Page<Patient>, StoreError> {
        const MATCH: &str = "deleted_at IS NULL AND (name ILIKE $1 OR cpf ILIKE $1 OR email ILIKE $1 \
             OR phone ILIKE $1 OR diagnosis ILIKE $1 \
             OR ($2 <> '' AND (cpf LIKE '%' || $2 || '%' OR phone LIKE '%' || $2 || '%')))";

        let pattern = like_pattern(query.trim());
        let digits = digits_only(query);

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM patients WHERE {MATCH}"))
            .bind(&pattern)
            .bind(&digits)
            .fetch_one(&self.pool)
            .await?;

        let (limit, offset) = limit_offset(page);
        let items = sqlx::query_as::<_, Patient>(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE {MATCH} \
             ORDER BY lower(name), id LIMIT $3 OFFSET $4"
        ))
        .bind(&pattern)
        .bind(&digits)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(to_page(items, total, page))
    }

    async fn exists_by_field(
        &self,
        field: PatientField,
        value: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, StoreError> {
        if value.is_empty() {
            return Ok(false);
        }
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM patients WHERE {} = $1 AND deleted_at IS NULL \
             AND ($2::bigint IS NULL OR id <> $2))",
            field.column()
        );
        let exists = sqlx::query_scalar::<_, bool>(&sql)
            .bind(value)
            .bind(exclude_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

// -- users --

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_user_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    if let Some(name) = filter.name.as_deref().filter(|v| !v.is_empty()) {
        qb.push(" AND name ILIKE ").push_bind(like_pattern(name));
    }
    if let Some(role) = filter.role.as_deref().filter(|v| !v.is_empty()) {
        qb.push(" AND role = ").push_bind(role.to_string());
    }
    if let Some(active) = filter.active {
        qb.push(" AND active = ").push_bind(active);
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: &NewUser) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (name, email, password_hash, role, permissions, scopes) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.role)
            .bind(&user.permissions)
            .bind(&user.scopes)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| write_error(e, "email"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL");
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1) AND deleted_at IS NULL"
        );
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let sql = format!(
            "UPDATE users SET name = $2, email = $3, role = $4, permissions = $5, scopes = $6, \
             active = $7, inactive_from = $8, inactive_until = $9, inactive_reason = $10, \
             updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.role)
            .bind(&user.permissions)
            .bind(&user.scopes)
            .bind(user.active)
            .bind(user.inactive_from)
            .bind(user.inactive_until)
            .bind(&user.inactive_reason)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| write_error(e, "email"))?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user.id)))
    }

    async fn set_password(&self, id: i64, password_hash: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn soft_delete(&self, id: i64, actor_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET active = FALSE, deleted_at = now(), deleted_by = $2 \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(actor_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn list(&self, filter: &UserFilter, page: PageRequest) -> Result<Page<User>, StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL");
        push_user_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let (limit, offset) = limit_offset(page);
        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL"
        ));
        push_user_filters(&mut select, filter);
        select
            .push(" ORDER BY lower(name), id LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let items = select.build_query_as::<User>().fetch_all(&self.pool).await?;

        Ok(to_page(items, total, page))
    }

    async fn search(&self, query: &str, page: PageRequest) -> Result<Page<User>, StoreError> {
        const MATCH: &str = "deleted_at IS NULL AND (name ILIKE $1 OR email ILIKE $1)";

        let pattern = like_pattern(query.trim());
        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM users WHERE {MATCH}"))
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;

        let (limit, offset) = limit_offset(page);
        let items = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {MATCH} ORDER BY lower(name), id LIMIT $2 OFFSET $3"
        ))
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(to_page(items, total, page))
    }

    async fn exists_by_field(
        &self,
        field: UserField,
        value: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, StoreError> {
        let sql = match field {
            UserField::Email => {
                "SELECT EXISTS(SELECT 1 FROM users WHERE lower(email) = lower($1) \
                 AND deleted_at IS NULL AND ($2::bigint IS NULL OR id <> $2))"
            }
        };
        let exists = sqlx::query_scalar::<_, bool>(sql)
            .bind(value)
            .bind(exclude_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn any_with_role(&self, role: &str) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE role = $1 AND deleted_at IS NULL)",
        )
        .bind(role)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}
