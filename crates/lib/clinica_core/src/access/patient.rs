//! Patient access validator.

use std::sync::Arc;

use chrono::{Local, NaiveDate};

use super::{AccessError, Granted, Operation, authorize};
use crate::models::auth::Claims;
use crate::models::patient::{Patient, PatientChanges, PatientData, PatientField};
use crate::store::PatientStore;
use crate::validation::{age, cep, cpf, email, phone, rg};

/// Permission resource name for patients.
pub const RESOURCE: &str = "pacientes";

/// Canonical document forms, trimmed text and upper-case state.
pub fn canonical(data: &PatientData) -> PatientData {
    PatientData {
        name: data.name.trim().to_string(),
        cpf: cpf::canonicalize(&data.cpf),
        rg: rg::canonicalize(&data.rg),
        phone: phone::canonicalize(&data.phone),
        email: email::canonicalize(&data.email),
        cep: cep::canonicalize(&data.cep),
        state: data.state.trim().to_uppercase(),
        guardian_name: data.guardian_name.trim().to_string(),
        guardian_phone: phone::canonicalize(&data.guardian_phone),
        guardian_email: email::canonicalize(&data.guardian_email),
        ..data.clone()
    }
}

/// Field rules for a full (created or merged) patient record.
pub fn check_fields(data: &PatientData, today: NaiveDate) -> Result<(), AccessError> {
    if data.name.is_empty() {
        return Err(AccessError::invalid("name is required"));
    }
    match data.birth_date {
        None => return Err(AccessError::invalid("birth date is required")),
        Some(birth) if birth > today => {
            return Err(AccessError::invalid("birth date cannot be in the future"));
        }
        Some(_) => {}
    }
    if data.phone.is_empty() {
        return Err(AccessError::invalid("phone is required"));
    }
    if !phone::validate(&data.phone) {
        return Err(AccessError::invalid("invalid phone"));
    }
    if !data.cpf.is_empty() && !cpf::validate(&data.cpf) {
        return Err(AccessError::invalid("invalid CPF"));
    }
    if !data.rg.is_empty() && !rg::validate(&data.rg) {
        return Err(AccessError::invalid("invalid RG"));
    }
    if !data.cep.is_empty() && !cep::validate(&data.cep) {
        return Err(AccessError::invalid("invalid CEP"));
    }
    if !data.email.is_empty() && !email::validate(&data.email) {
        return Err(AccessError::invalid("invalid email"));
    }
    if !data.guardian_phone.is_empty() && !phone::validate(&data.guardian_phone) {
        return Err(AccessError::invalid("invalid guardian phone"));
    }
    if !data.guardian_email.is_empty() && !email::validate(&data.guardian_email) {
        return Err(AccessError::invalid("invalid guardian email"));
    }
    Ok(())
}

/// Minors need a guardian name and phone.
pub fn check_guardian(data: &PatientData, today: NaiveDate) -> Result<(), AccessError> {
    if !age::is_minor_on(data.birth_date, today) {
        return Ok(());
    }
    if data.guardian_name.is_empty() {
        return Err(AccessError::invalid("guardian name is required for minors"));
    }
    if data.guardian_phone.is_empty() {
        return Err(AccessError::invalid("guardian phone is required for minors"));
    }
    Ok(())
}

/// Gatekeeper for every patient operation.
#[derive(Clone)]
pub struct PatientAccessValidator {
    store: Arc<dyn PatientStore>,
}

impl PatientAccessValidator {
    pub fn new(store: Arc<dyn PatientStore>) -> Self {
        Self { store }
    }

    /// Authentication and authorization only; for lists and searches.
    pub fn authorize<'a>(&self, claims: Option<&'a Claims>, operation: Operation) -> Result<&'a Claims, AccessError> {
        authorize(claims, RESOURCE, operation)
    }

    pub async fn validate_create(
        &self,
        claims: Option<&Claims>,
        input: &PatientData,
    ) -> Result<Granted<PatientData>, AccessError> {
        let actor = self.authorize(claims, Operation::Create)?;
        let today = Local::now().date_naive();

        let data = canonical(input);
        check_fields(&data, today)?;
        check_guardian(&data, today)?;
        self.ensure_cpf_free(&data.cpf, None).await?;

        Ok(Granted {
            actor_id: actor.subject_id(),
            value: data,
        })
    }

    pub async fn validate_read(&self, claims: Option<&Claims>, id: i64) -> Result<Granted<Patient>, AccessError> {
        let actor = self.authorize(claims, Operation::Read)?;
        let patient = self.existing(id).await?;
        Ok(Granted {
            actor_id: actor.subject_id(),
            value: patient,
        })
    }

    /// Returns the merged, canonical record to persist.
    pub async fn validate_update(
        &self,
        claims: Option<&Claims>,
        id: i64,
        changes: &PatientChanges,
    ) -> Result<Granted<PatientData>, AccessError> {
        let actor = self.authorize(claims, Operation::Update)?;
        let existing = self.existing(id).await?;
        let today = Local::now().date_naive();

        let merged = canonical(&changes.apply(&existing.data));
        check_fields(&merged, today)?;
        check_guardian(&merged, today)?;
        if merged.cpf != existing.data.cpf {
            self.ensure_cpf_free(&merged.cpf, Some(id)).await?;
        }

        Ok(Granted {
            actor_id: actor.subject_id(),
            value: merged,
        })
    }

    pub async fn validate_delete(&self, claims: Option<&Claims>, id: i64) -> Result<Granted<Patient>, AccessError> {
        let actor = self.authorize(claims, Operation::Delete)?;
        let patient = self.existing(id).await?;
        Ok(Granted {
            actor_id: actor.subject_id(),
            value: patient,
        })
    }

    async fn existing(&self, id: i64) -> Result<Patient, AccessError> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("patient {id} not found")))
    }

    async fn ensure_cpf_free(&self, cpf: &str, exclude_id: Option<i64>) -> Result<(), AccessError> {
        if cpf.is_empty() {
            return Ok(());
        }
        if self.store.exists_by_field(PatientField::Cpf, cpf, exclude_id).await? {
            return Err(AccessError::DuplicateResource(
                "CPF already registered for another patient".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Months;

    use super::*;
    use crate::access::test_support::claims;
    use crate::models::page::{Page, PageRequest};
    use crate::models::patient::PatientFilter;
    use crate::store::StoreError;
    use crate::store::memory::MemoryPatientStore;

    /// Delegates to the memory store while counting data-store calls.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryPatientStore,
        lookups: AtomicUsize,
        uniqueness_checks: AtomicUsize,
    }

    impl CountingStore {
        fn store_calls(&self) -> usize {
            self.lookups.load(Ordering::SeqCst) + self.uniqueness_checks.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PatientStore for CountingStore {
        async fn create(&self, data: &PatientData, actor_id: i64) -> Result<Patient, StoreError> {
            self.inner.create(data, actor_id).await
        }

        async fn get_by_id(&self, id: i64) -> Result<Option<Patient>, StoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.get_by_id(id).await
        }

        async fn get_by_cpf(&self, cpf: &str) -> Result<Option<Patient>, StoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.get_by_cpf(cpf).await
        }

        async fn update(&self, id: i64, data: &PatientData, actor_id: i64) -> Result<Patient, StoreError> {
            self.inner.update(id, data, actor_id).await
        }

        async fn soft_delete(&self, id: i64, actor_id: i64) -> Result<(), StoreError> {
            self.inner.soft_delete(id, actor_id).await
        }

        async fn list(&self, filter: &PatientFilter, page: PageRequest) -> Result<Page<Patient>, StoreError> {
            self.inner.list(filter, page).await
        }

        async fn search(&self, query: &str, page: PageRequest) -> Result<Page<Patient>, StoreError> {
            self.inner.search(query, page).await
        }

        async fn exists_by_field(
            &self,
            field: PatientField,
            value: &str,
            exclude_id: Option<i64>,
        ) -> Result<bool, StoreError> {
            self.uniqueness_checks.fetch_add(1, Ordering::SeqCst);
            self.inner.exists_by_field(field, value, exclude_id).await
        }
    }

    fn years_ago(years: u32) -> NaiveDate {
        Local::now()
            .date_naive()
            .checked_sub_months(Months::new(years * 12))
            .unwrap()
    }

    fn adult(name: &str, cpf: &str) -> PatientData {
        PatientData {
            name: name.into(),
            cpf: cpf.into(),
            birth_date: Some(years_ago(30)),
            phone: "(11) 98888-7777".into(),
            ..PatientData::default()
        }
    }

    fn setup() -> (Arc<CountingStore>, PatientAccessValidator) {
        let store = Arc::new(CountingStore::default());
        let validator = PatientAccessValidator::new(store.clone());
        (store, validator)
    }

    fn therapist() -> Claims {
        claims(7, &["terapeuta"], &["pacientes:*"])
    }

    #[tokio::test]
    async fn unauthenticated_update_never_touches_the_store() {
        let (store, validator) = setup();
        let p = store.inner.create(&adult("Ana", "52998224725"), 1).await.unwrap();

        let changes = PatientChanges {
            cpf: Some("111.444.777-35".into()),
            ..PatientChanges::default()
        };
        let err = validator.validate_update(None, p.id, &changes).await.unwrap_err();

        assert!(matches!(err, AccessError::Unauthorized));
        assert_eq!(store.uniqueness_checks.load(Ordering::SeqCst), 0);
        assert_eq!(store.store_calls(), 0);
    }

    #[tokio::test]
    async fn forbidden_update_never_touches_the_store() {
        let (store, validator) = setup();
        let reader = claims(2, &["recepcao"], &["pacientes:read"]);

        let err = validator
            .validate_update(Some(&reader), 1, &PatientChanges::diagnosis("TEA"))
            .await
            .unwrap_err();

        assert!(matches!(err, AccessError::Forbidden(_)));
        assert_eq!(store.store_calls(), 0);
    }

    #[tokio::test]
    async fn create_canonicalizes_documents() {
        let (_, validator) = setup();
        let input = PatientData {
            email: " Ana@Email.COM ".into(),
            cep: "01310-100".into(),
            state: "sp".into(),
            ..adult(" Ana ", "529.982.247-25")
        };
        let granted = validator.validate_create(Some(&therapist()), &input).await.unwrap();

        assert_eq!(granted.actor_id, 7);
        assert_eq!(granted.value.name, "Ana");
        assert_eq!(granted.value.cpf, "52998224725");
        assert_eq!(granted.value.phone, "11988887777");
        assert_eq!(granted.value.email, "ana@email.com");
        assert_eq!(granted.value.cep, "01310100");
        assert_eq!(granted.value.state, "SP");
    }

    #[tokio::test]
    async fn create_rejects_invalid_documents() {
        let (_, validator) = setup();
        let c = therapist();
        let cases = [
            adult("Ana", "123.456.789-00"),
            PatientData {
                phone: "888887777".into(),
                ..adult("Ana", "")
            },
            PatientData {
                email: "not-an-email".into(),
                ..adult("Ana", "")
            },
            PatientData {
                cep: "123".into(),
                ..adult("Ana", "")
            },
            PatientData {
                name: "  ".into(),
                ..adult("Ana", "")
            },
            PatientData {
                birth_date: None,
                ..adult("Ana", "")
            },
            PatientData {
                phone: String::new(),
                ..adult("Ana", "")
            },
        ];
        for input in &cases {
            let err = validator.validate_create(Some(&c), input).await.unwrap_err();
            assert!(matches!(err, AccessError::InvalidInput(_)), "{input:?}: {err:?}");
        }
    }

    #[tokio::test]
    async fn future_birth_date_is_invalid() {
        let (_, validator) = setup();
        let input = PatientData {
            birth_date: Local::now().date_naive().succ_opt(),
            ..adult("Ana", "")
        };
        let err = validator.validate_create(Some(&therapist()), &input).await.unwrap_err();
        assert!(matches!(err, AccessError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn minor_needs_guardian_name_and_phone() {
        let (_, validator) = setup();
        let c = therapist();
        let minor = PatientData {
            birth_date: Some(years_ago(17)),
            ..adult("Pedro", "")
        };
        let err = validator.validate_create(Some(&c), &minor).await.unwrap_err();
        assert!(matches!(err, AccessError::InvalidInput(_)));

        let only_name = PatientData {
            guardian_name: "Maria".into(),
            ..minor.clone()
        };
        let err = validator.validate_create(Some(&c), &only_name).await.unwrap_err();
        assert!(matches!(err, AccessError::InvalidInput(_)));

        let with_guardian = PatientData {
            guardian_name: "Maria".into(),
            guardian_phone: "11977776666".into(),
            ..minor
        };
        assert!(validator.validate_create(Some(&c), &with_guardian).await.is_ok());
    }

    #[tokio::test]
    async fn duplicate_cpf_on_create() {
        let (store, validator) = setup();
        store.inner.create(&adult("Ana", "52998224725"), 1).await.unwrap();

        let err = validator
            .validate_create(Some(&therapist()), &adult("Bia", "529.982.247-25"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::DuplicateResource(_)));
    }

    #[tokio::test]
    async fn update_merges_and_keeps_own_cpf() {
        let (store, validator) = setup();
        let p = store.inner.create(&adult("Ana", "52998224725"), 1).await.unwrap();

        let granted = validator
            .validate_update(Some(&therapist()), p.id, &PatientChanges::diagnosis("TEA nível 1"))
            .await
            .unwrap();
        assert_eq!(granted.value.diagnosis, "TEA nível 1");
        assert_eq!(granted.value.cpf, "52998224725");
        assert_eq!(granted.value.name, "Ana");
        // CPF unchanged, so no uniqueness query.
        assert_eq!(store.uniqueness_checks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn update_to_taken_cpf_is_duplicate() {
        let (store, validator) = setup();
        store.inner.create(&adult("Ana", "52998224725"), 1).await.unwrap();
        let bia = store.inner.create(&adult("Bia", "11144477735"), 1).await.unwrap();

        let changes = PatientChanges {
            cpf: Some("529.982.247-25".into()),
            ..PatientChanges::default()
        };
        let err = validator
            .validate_update(Some(&therapist()), bia.id, &changes)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::DuplicateResource(_)));
        assert_eq!(store.uniqueness_checks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn update_of_missing_patient_is_not_found() {
        let (_, validator) = setup();
        let err = validator
            .validate_update(Some(&therapist()), 99, &PatientChanges::diagnosis("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_making_patient_a_minor_needs_guardian() {
        let (store, validator) = setup();
        let p = store.inner.create(&adult("Ana", ""), 1).await.unwrap();
        let changes = PatientChanges {
            birth_date: Some(years_ago(10)),
            ..PatientChanges::default()
        };
        let err = validator
            .validate_update(Some(&therapist()), p.id, &changes)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn read_and_delete_require_a_live_patient() {
        let (store, validator) = setup();
        let c = therapist();
        let p = store.inner.create(&adult("Ana", ""), 1).await.unwrap();

        assert_eq!(validator.validate_read(Some(&c), p.id).await.unwrap().value.id, p.id);
        assert!(validator.validate_delete(Some(&c), p.id).await.is_ok());

        store.inner.soft_delete(p.id, 7).await.unwrap();
        assert!(matches!(
            validator.validate_read(Some(&c), p.id).await,
            Err(AccessError::NotFound(_))
        ));
        assert!(matches!(
            validator.validate_delete(Some(&c), p.id).await,
            Err(AccessError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn reception_cannot_delete() {
        let (store, validator) = setup();
        let p = store.inner.create(&adult("Ana", ""), 1).await.unwrap();
        let reception = claims(3, &["recepcao"], &["pacientes:read", "pacientes:create", "pacientes:update"]);
        assert!(matches!(
            validator.validate_delete(Some(&reception), p.id).await,
            Err(AccessError::Forbidden(_))
        ));
    }
}
