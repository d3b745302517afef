//! JSON-on-disk implementation of the portal's row stores.

use crate::StoreError;
use chrono::{DateTime, Datelike, Utc};
use portal_core::{
    Case, CaseError, CaseFilter, CaseResult, CaseStatus, CaseStore, Clinic, Consent, ConsentStore,
    KitOrder, KitOrderStatus, KitOrderStore, NewCase, NewConsent, NewKitOrder, Provider, RecordId,
    ReferenceDirectory, ReportAttachment, User,
};
use portal_types::NonEmptyText;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const ROW_FILE: &str = "row.json";
const CASE_COUNTER_FILE: &str = "case_counter.json";

const CASES_DIR: &str = "cases";
const CONSENTS_DIR: &str = "consents";
const KIT_ORDERS_DIR: &str = "kit_orders";
const USERS_DIR: &str = "users";
const CLINICS_DIR: &str = "clinics";
const PROVIDERS_DIR: &str = "providers";

/// Per-year sequence backing human-readable case numbers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct CaseCounter {
    year: i32,
    seq: u32,
}

/// Row store keeping every table as sharded directories of JSON documents.
///
/// All mutation goes through a single write lock, which makes per-row updates
/// atomic (last write wins across concurrent operators) and case-number
/// allocation collision-free within one process. Reads take no lock; the
/// temp-file-then-rename write discipline means readers never observe a
/// half-written row.
#[derive(Debug)]
pub struct JsonStore {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonStore {
    /// Opens a store rooted at `data_dir`.
    ///
    /// Table directories are created lazily on first write; only the root
    /// itself must already exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidDataRoot`] if `data_dir` does not exist or
    /// is not a directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        if !data_dir.is_dir() {
            return Err(StoreError::InvalidDataRoot(
                data_dir.display().to_string(),
            ));
        }
        Ok(Self {
            data_dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Inserts or overwrites a user row. Seeding API for the runner and CLI;
    /// user administration is otherwise out of scope.
    pub fn put_user(&self, user: &User) -> Result<(), StoreError> {
        let _guard = self.guard()?;
        let dir = self.row_dir(USERS_DIR, user.id);
        write_json_atomic(&dir.join(ROW_FILE), user)
    }

    /// Inserts or overwrites a clinic row.
    pub fn put_clinic(&self, clinic: &Clinic) -> Result<(), StoreError> {
        let _guard = self.guard()?;
        let dir = self.row_dir(CLINICS_DIR, clinic.id);
        write_json_atomic(&dir.join(ROW_FILE), clinic)
    }

    /// Inserts or overwrites a provider row.
    pub fn put_provider(&self, provider: &Provider) -> Result<(), StoreError> {
        let _guard = self.guard()?;
        let dir = self.row_dir(PROVIDERS_DIR, provider.id);
        write_json_atomic(&dir.join(ROW_FILE), provider)
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn table_dir(&self, table: &str) -> PathBuf {
        self.data_dir.join(table)
    }

    fn row_dir(&self, table: &str, id: RecordId) -> PathBuf {
        id.sharded_dir(&self.table_dir(table))
    }

    fn read_row<T: DeserializeOwned>(&self, table: &str, id: RecordId) -> Result<Option<T>, StoreError> {
        let path = self.row_dir(table, id).join(ROW_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Allocates a fresh row directory under `table`, guarding against
    /// identifier collisions (or pre-existing directories from external
    /// interference) by retrying up to 5 times with different identifiers.
    fn allocate_row_dir(&self, table: &str) -> Result<(RecordId, PathBuf), StoreError> {
        let table_dir = self.table_dir(table);
        for _attempt in 0..5 {
            let id = RecordId::new();
            let candidate = id.sharded_dir(&table_dir);

            if candidate.exists() {
                continue;
            }

            if let Some(parent) = candidate.parent() {
                fs::create_dir_all(parent).map_err(StoreError::RowAllocation)?;
            }

            match fs::create_dir(&candidate) {
                Ok(()) => return Ok((id, candidate)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(StoreError::RowAllocation(e)),
            }
        }

        Err(StoreError::RowAllocation(io::Error::new(
            ErrorKind::AlreadyExists,
            "failed to allocate a unique row directory after 5 attempts",
        )))
    }

    /// Allocates the next case number for the current year.
    ///
    /// The sequence resets at the turn of the year, matching the lab's
    /// `AG-<year>-<seq>` accessioning convention. Callers must hold the write
    /// lock.
    fn next_case_number(&self) -> Result<NonEmptyText, StoreError> {
        let current_year = Utc::now().year();
        let path = self.table_dir(CASES_DIR).join(CASE_COUNTER_FILE);

        let mut counter = if path.is_file() {
            let contents = fs::read_to_string(&path)?;
            serde_json::from_str::<CaseCounter>(&contents)?
        } else {
            CaseCounter {
                year: current_year,
                seq: 0,
            }
        };

        if counter.year != current_year {
            counter = CaseCounter {
                year: current_year,
                seq: 0,
            };
        }
        counter.seq += 1;

        write_json_atomic(&path, &counter)?;

        Ok(NonEmptyText::new(&format!(
            "AG-{}-{:04}",
            counter.year, counter.seq
        ))?)
    }

    fn all_consents_for_case(&self, case_id: RecordId) -> Vec<Consent> {
        let mut consents: Vec<Consent> = walk_rows(&self.table_dir(CONSENTS_DIR));
        consents.retain(|consent| consent.case_id == case_id);
        consents.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        consents
    }
}

impl CaseStore for JsonStore {
    fn insert_case(&self, new_case: NewCase) -> CaseResult<Case> {
        let _guard = self.guard().map_err(CaseError::from)?;

        let (id, dir) = self.allocate_row_dir(CASES_DIR)?;
        let case_number = self.next_case_number()?;

        let case = Case {
            id,
            case_number,
            clinic_id: new_case.clinic_id,
            submitted_by_user_id: new_case.submitted_by_user_id,
            patient: new_case.patient,
            partner: new_case.partner,
            is_egg_donor: new_case.is_egg_donor,
            egg_donor_age: new_case.egg_donor_age,
            no_partner: new_case.no_partner,
            sperm_source: new_case.sperm_source,
            is_sperm_donor: new_case.is_sperm_donor,
            ordering_provider_id: new_case.ordering_provider_id,
            tests_ordered: new_case.tests_ordered,
            indication: new_case.indication,
            mask_sex_results: new_case.mask_sex_results,
            reason_for_testing: new_case.reason_for_testing,
            karyotype_file_path: new_case.karyotype_file_path,
            status: new_case.initial_status,
            report_file_url: None,
            report_file_name: None,
            report_uploaded_at: None,
            created_at: new_case.created_at,
        };

        write_json_atomic(&dir.join(ROW_FILE), &case)?;
        Ok(case)
    }

    fn fetch_case(&self, id: RecordId) -> CaseResult<Case> {
        self.read_row(CASES_DIR, id)?.ok_or(CaseError::NotFound {
            entity: "case",
            id: id.to_string(),
        })
    }

    fn list_cases(&self, filter: &CaseFilter) -> CaseResult<Vec<Case>> {
        let mut cases: Vec<Case> = walk_rows(&self.table_dir(CASES_DIR));
        cases.retain(|case| {
            filter.clinic_id.map_or(true, |clinic| case.clinic_id == clinic)
                && filter.status.map_or(true, |status| case.status == status)
        });
        cases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(cases)
    }

    fn update_status(&self, id: RecordId, status: CaseStatus) -> CaseResult<Case> {
        let _guard = self.guard().map_err(CaseError::from)?;

        let mut case = self.fetch_case(id)?;
        case.status = status;
        write_json_atomic(&self.row_dir(CASES_DIR, id).join(ROW_FILE), &case)?;
        Ok(case)
    }

    fn attach_report(&self, id: RecordId, attachment: ReportAttachment) -> CaseResult<Case> {
        let _guard = self.guard().map_err(CaseError::from)?;

        let mut case = self.fetch_case(id)?;
        case.report_file_url = Some(attachment.file_url);
        case.report_file_name = Some(attachment.file_name);
        case.report_uploaded_at = Some(attachment.uploaded_at);
        case.status = CaseStatus::ReportReady;
        write_json_atomic(&self.row_dir(CASES_DIR, id).join(ROW_FILE), &case)?;
        Ok(case)
    }
}

impl ConsentStore for JsonStore {
    fn insert_consent(&self, new_consent: NewConsent) -> CaseResult<Consent> {
        let _guard = self.guard().map_err(CaseError::from)?;

        let duplicate = self
            .all_consents_for_case(new_consent.case_id)
            .iter()
            .any(|existing| existing.signer_role == new_consent.signer_role);
        if duplicate {
            return Err(CaseError::DuplicateConsent);
        }

        let (id, dir) = self.allocate_row_dir(CONSENTS_DIR)?;
        let consent = Consent {
            id,
            case_id: new_consent.case_id,
            signer_role: new_consent.signer_role,
            recipient_name: new_consent.recipient_name,
            recipient_email: new_consent.recipient_email,
            recipient_phone: new_consent.recipient_phone,
            signed_at: None,
            created_at: new_consent.created_at,
        };

        write_json_atomic(&dir.join(ROW_FILE), &consent)?;
        Ok(consent)
    }

    fn consents_for_case(&self, case_id: RecordId) -> CaseResult<Vec<Consent>> {
        Ok(self.all_consents_for_case(case_id))
    }

    fn mark_signed(&self, consent_id: RecordId, at: DateTime<Utc>) -> CaseResult<Consent> {
        let _guard = self.guard().map_err(CaseError::from)?;

        let mut consent: Consent =
            self.read_row(CONSENTS_DIR, consent_id)?
                .ok_or(CaseError::NotFound {
                    entity: "consent",
                    id: consent_id.to_string(),
                })?;
        consent.signed_at = Some(at);
        write_json_atomic(
            &self.row_dir(CONSENTS_DIR, consent_id).join(ROW_FILE),
            &consent,
        )?;
        Ok(consent)
    }
}

impl KitOrderStore for JsonStore {
    fn insert_order(&self, new_order: NewKitOrder) -> CaseResult<KitOrder> {
        let _guard = self.guard().map_err(CaseError::from)?;

        let (id, dir) = self.allocate_row_dir(KIT_ORDERS_DIR)?;
        let order = KitOrder {
            id,
            clinic_id: new_order.clinic_id,
            ordered_by_user_id: new_order.ordered_by_user_id,
            status: KitOrderStatus::Pending,
            items: new_order.items,
            shipping_address: new_order.shipping_address,
            notes: new_order.notes,
            created_at: new_order.created_at,
        };

        write_json_atomic(&dir.join(ROW_FILE), &order)?;
        Ok(order)
    }
}

impl ReferenceDirectory for JsonStore {
    fn fetch_user(&self, id: RecordId) -> CaseResult<User> {
        self.read_row(USERS_DIR, id)?.ok_or(CaseError::NotFound {
            entity: "user",
            id: id.to_string(),
        })
    }

    fn fetch_clinic(&self, id: RecordId) -> CaseResult<Clinic> {
        self.read_row(CLINICS_DIR, id)?.ok_or(CaseError::NotFound {
            entity: "clinic",
            id: id.to_string(),
        })
    }

    fn fetch_provider(&self, id: RecordId) -> CaseResult<Provider> {
        self.read_row(PROVIDERS_DIR, id)?.ok_or(CaseError::NotFound {
            entity: "provider",
            id: id.to_string(),
        })
    }

    fn active_users_for_clinic(&self, clinic_id: RecordId) -> CaseResult<Vec<User>> {
        let mut users: Vec<User> = walk_rows(&self.table_dir(USERS_DIR));
        users.retain(|user| user.clinic_id == Some(clinic_id) && user.is_active);
        Ok(users)
    }
}

/// Writes a JSON document atomically: serialise, write to a sibling temp file,
/// rename over the target.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let rendered = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, rendered)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Reads every row document under a sharded table directory.
///
/// Rows that cannot be read or parsed are logged as warnings and skipped; a
/// missing table directory yields an empty list.
fn walk_rows<T: DeserializeOwned>(table_dir: &Path) -> Vec<T> {
    let mut rows = Vec::new();

    let s1_iter = match fs::read_dir(table_dir) {
        Ok(it) => it,
        Err(_) => return rows,
    };
    for s1 in s1_iter.flatten() {
        let s1_path = s1.path();
        if !s1_path.is_dir() {
            continue;
        }

        let s2_iter = match fs::read_dir(&s1_path) {
            Ok(it) => it,
            Err(_) => continue,
        };

        for s2 in s2_iter.flatten() {
            let s2_path = s2.path();
            if !s2_path.is_dir() {
                continue;
            }

            let id_iter = match fs::read_dir(&s2_path) {
                Ok(it) => it,
                Err(_) => continue,
            };

            for id_ent in id_iter.flatten() {
                let id_path = id_ent.path();
                if !id_path.is_dir() {
                    continue;
                }

                let row_path = id_path.join(ROW_FILE);
                if !row_path.is_file() {
                    continue;
                }

                match fs::read_to_string(&row_path) {
                    Ok(contents) => match serde_json::from_str(&contents) {
                        Ok(row) => rows.push(row),
                        Err(e) => {
                            tracing::warn!(
                                "failed to parse row: {} - {}",
                                row_path.display(),
                                e
                            );
                        }
                    },
                    Err(e) => {
                        tracing::warn!("failed to read row: {} - {}", row_path.display(), e);
                    }
                }
            }
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use portal_core::{
        Indication, KitOrderItems, PersonDetails, SignerRole, SpermSource, TestType, UserRole,
    };
    use portal_types::EmailAddress;
    use tempfile::TempDir;

    fn person(first: &str, last: &str, email: &str) -> PersonDetails {
        PersonDetails {
            first_name: NonEmptyText::new(first).unwrap(),
            last_name: NonEmptyText::new(last).unwrap(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 4, 2).unwrap(),
            email: EmailAddress::new(email).unwrap(),
            phone: None,
        }
    }

    fn new_case(clinic_id: RecordId, created_at: DateTime<Utc>) -> NewCase {
        NewCase {
            clinic_id,
            submitted_by_user_id: RecordId::new(),
            patient: person("Ana", "Silva", "ana@example.org"),
            partner: None,
            is_egg_donor: false,
            egg_donor_age: None,
            no_partner: true,
            sperm_source: SpermSource::Donor,
            is_sperm_donor: true,
            ordering_provider_id: RecordId::new(),
            tests_ordered: vec![TestType::PgtA],
            indication: Indication::AdvancedMaternalAge,
            mask_sex_results: false,
            reason_for_testing: None,
            karyotype_file_path: None,
            initial_status: CaseStatus::ConsentPending,
            created_at,
        }
    }

    fn new_consent(
        case_id: RecordId,
        signer_role: SignerRole,
        created_at: DateTime<Utc>,
    ) -> NewConsent {
        NewConsent {
            case_id,
            signer_role,
            recipient_name: "Ana Silva".to_string(),
            recipient_email: EmailAddress::new("ana@example.org").unwrap(),
            recipient_phone: None,
            created_at,
        }
    }

    fn clinic_user(clinic_id: Option<RecordId>, email: &str, is_active: bool) -> User {
        User {
            id: RecordId::new(),
            clinic_id,
            first_name: NonEmptyText::new("Robin").unwrap(),
            last_name: NonEmptyText::new("Hale").unwrap(),
            email: EmailAddress::new(email).unwrap(),
            role: UserRole::ClinicUser,
            is_active,
        }
    }

    #[test]
    fn new_rejects_missing_root() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope");
        let err = JsonStore::new(&missing).expect_err("missing root should be rejected");
        assert!(matches!(err, StoreError::InvalidDataRoot(_)));
    }

    #[test]
    fn insert_assigns_sequential_case_numbers() {
        let temp = TempDir::new().unwrap();
        let store = JsonStore::new(temp.path()).unwrap();
        let clinic = RecordId::new();

        let first = store.insert_case(new_case(clinic, Utc::now())).unwrap();
        let second = store.insert_case(new_case(clinic, Utc::now())).unwrap();

        let year = Utc::now().year();
        assert_eq!(first.case_number.as_str(), format!("AG-{year}-0001"));
        assert_eq!(second.case_number.as_str(), format!("AG-{year}-0002"));
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn case_number_sequence_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let clinic = RecordId::new();

        {
            let store = JsonStore::new(temp.path()).unwrap();
            store.insert_case(new_case(clinic, Utc::now())).unwrap();
        }

        let store = JsonStore::new(temp.path()).unwrap();
        let case = store.insert_case(new_case(clinic, Utc::now())).unwrap();
        let year = Utc::now().year();
        assert_eq!(case.case_number.as_str(), format!("AG-{year}-0002"));
    }

    #[test]
    fn fetch_returns_inserted_case() {
        let temp = TempDir::new().unwrap();
        let store = JsonStore::new(temp.path()).unwrap();

        let inserted = store.insert_case(new_case(RecordId::new(), Utc::now())).unwrap();
        let fetched = store.fetch_case(inserted.id).unwrap();

        assert_eq!(fetched.id, inserted.id);
        assert_eq!(fetched.case_number, inserted.case_number);
        assert_eq!(fetched.status, CaseStatus::ConsentPending);
        assert_eq!(fetched.patient.full_name(), "Ana Silva");
    }

    #[test]
    fn fetch_unknown_case_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = JsonStore::new(temp.path()).unwrap();

        let err = store.fetch_case(RecordId::new()).expect_err("should be missing");
        assert!(matches!(err, CaseError::NotFound { entity: "case", .. }));
    }

    #[test]
    fn list_filters_by_clinic_and_status_newest_first() {
        let temp = TempDir::new().unwrap();
        let store = JsonStore::new(temp.path()).unwrap();
        let clinic_a = RecordId::new();
        let clinic_b = RecordId::new();
        let now = Utc::now();

        let older = store
            .insert_case(new_case(clinic_a, now - Duration::minutes(10)))
            .unwrap();
        let newer = store.insert_case(new_case(clinic_a, now)).unwrap();
        store
            .insert_case(new_case(clinic_b, now - Duration::minutes(5)))
            .unwrap();

        let for_a = store
            .list_cases(&CaseFilter {
                clinic_id: Some(clinic_a),
                status: None,
            })
            .unwrap();
        assert_eq!(for_a.len(), 2);
        assert_eq!(for_a[0].id, newer.id, "newest case should come first");
        assert_eq!(for_a[1].id, older.id);

        store.update_status(newer.id, CaseStatus::InProgress).unwrap();
        let in_progress = store
            .list_cases(&CaseFilter {
                clinic_id: Some(clinic_a),
                status: Some(CaseStatus::InProgress),
            })
            .unwrap();
        assert_eq!(in_progress.len(), 1);
        assert_eq!(in_progress[0].id, newer.id);
    }

    #[test]
    fn update_status_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let case_id = {
            let store = JsonStore::new(temp.path()).unwrap();
            let case = store.insert_case(new_case(RecordId::new(), Utc::now())).unwrap();
            store.update_status(case.id, CaseStatus::SamplesReceived).unwrap();
            case.id
        };

        let store = JsonStore::new(temp.path()).unwrap();
        let case = store.fetch_case(case_id).unwrap();
        assert_eq!(case.status, CaseStatus::SamplesReceived);
    }

    #[test]
    fn attach_report_records_file_and_forces_report_ready() {
        let temp = TempDir::new().unwrap();
        let store = JsonStore::new(temp.path()).unwrap();
        let case = store.insert_case(new_case(RecordId::new(), Utc::now())).unwrap();
        let uploaded_at = Utc::now();

        let updated = store
            .attach_report(
                case.id,
                ReportAttachment {
                    file_url: "https://files.example/reports/x.pdf".to_string(),
                    file_name: "report.pdf".to_string(),
                    uploaded_at,
                },
            )
            .unwrap();

        assert_eq!(updated.status, CaseStatus::ReportReady);
        assert_eq!(
            updated.report_file_url.as_deref(),
            Some("https://files.example/reports/x.pdf")
        );
        assert_eq!(updated.report_file_name.as_deref(), Some("report.pdf"));
        assert_eq!(updated.report_uploaded_at, Some(uploaded_at));
    }

    #[test]
    fn duplicate_consent_for_same_signer_is_rejected() {
        let temp = TempDir::new().unwrap();
        let store = JsonStore::new(temp.path()).unwrap();
        let case = store.insert_case(new_case(RecordId::new(), Utc::now())).unwrap();

        store
            .insert_consent(new_consent(case.id, SignerRole::Patient, Utc::now()))
            .unwrap();
        let err = store
            .insert_consent(new_consent(case.id, SignerRole::Patient, Utc::now()))
            .expect_err("second patient consent should be rejected");
        assert!(matches!(err, CaseError::DuplicateConsent));

        // A different signer role for the same case is fine.
        store
            .insert_consent(new_consent(case.id, SignerRole::Partner, Utc::now()))
            .unwrap();
        let consents = store.consents_for_case(case.id).unwrap();
        assert_eq!(consents.len(), 2);
    }

    #[test]
    fn consents_list_in_creation_order() {
        let temp = TempDir::new().unwrap();
        let store = JsonStore::new(temp.path()).unwrap();
        let case = store.insert_case(new_case(RecordId::new(), Utc::now())).unwrap();
        let now = Utc::now();

        store
            .insert_consent(new_consent(case.id, SignerRole::Patient, now))
            .unwrap();
        store
            .insert_consent(new_consent(
                case.id,
                SignerRole::Partner,
                now + Duration::seconds(1),
            ))
            .unwrap();

        let consents = store.consents_for_case(case.id).unwrap();
        assert_eq!(consents[0].signer_role, SignerRole::Patient);
        assert_eq!(consents[1].signer_role, SignerRole::Partner);
    }

    #[test]
    fn mark_signed_sets_timestamp() {
        let temp = TempDir::new().unwrap();
        let store = JsonStore::new(temp.path()).unwrap();
        let case = store.insert_case(new_case(RecordId::new(), Utc::now())).unwrap();
        let consent = store
            .insert_consent(new_consent(case.id, SignerRole::Patient, Utc::now()))
            .unwrap();
        assert!(consent.signed_at.is_none());

        let signed_at = Utc::now();
        let signed = store.mark_signed(consent.id, signed_at).unwrap();
        assert_eq!(signed.signed_at, Some(signed_at));

        let reread = store.consents_for_case(case.id).unwrap();
        assert_eq!(reread[0].signed_at, Some(signed_at));
    }

    #[test]
    fn mark_signed_unknown_consent_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = JsonStore::new(temp.path()).unwrap();

        let err = store
            .mark_signed(RecordId::new(), Utc::now())
            .expect_err("should be missing");
        assert!(matches!(err, CaseError::NotFound { entity: "consent", .. }));
    }

    #[test]
    fn insert_order_is_pending() {
        let temp = TempDir::new().unwrap();
        let store = JsonStore::new(temp.path()).unwrap();

        let order = store
            .insert_order(NewKitOrder {
                clinic_id: RecordId::new(),
                ordered_by_user_id: RecordId::new(),
                items: KitOrderItems {
                    biopsy_collection_kits: 2,
                    shipping_containers: 1,
                    collection_tubes: 10,
                },
                shipping_address: "1 Main Street".to_string(),
                notes: None,
                created_at: Utc::now(),
            })
            .unwrap();

        assert_eq!(order.status, KitOrderStatus::Pending);
        assert_eq!(order.items.collection_tubes, 10);
    }

    #[test]
    fn active_users_excludes_inactive_and_other_clinics() {
        let temp = TempDir::new().unwrap();
        let store = JsonStore::new(temp.path()).unwrap();
        let clinic = RecordId::new();
        let other_clinic = RecordId::new();

        let active = clinic_user(Some(clinic), "robin@example.org", true);
        store.put_user(&active).unwrap();
        store
            .put_user(&clinic_user(Some(clinic), "gone@example.org", false))
            .unwrap();
        store
            .put_user(&clinic_user(Some(other_clinic), "else@example.org", true))
            .unwrap();
        store.put_user(&clinic_user(None, "admin@example.org", true)).unwrap();

        let users = store.active_users_for_clinic(clinic).unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, active.id);
    }

    #[test]
    fn reference_rows_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = JsonStore::new(temp.path()).unwrap();

        let clinic = Clinic {
            id: RecordId::new(),
            name: NonEmptyText::new("Bright Fertility").unwrap(),
            address: Some("1 Main Street".to_string()),
            is_active: true,
        };
        store.put_clinic(&clinic).unwrap();
        let fetched = store.fetch_clinic(clinic.id).unwrap();
        assert_eq!(fetched.name.as_str(), "Bright Fertility");

        let provider = Provider {
            id: RecordId::new(),
            clinic_id: clinic.id,
            first_name: NonEmptyText::new("Sam").unwrap(),
            last_name: NonEmptyText::new("Osei").unwrap(),
            credentials: Some("MD".to_string()),
            is_active: true,
        };
        store.put_provider(&provider).unwrap();
        let fetched = store.fetch_provider(provider.id).unwrap();
        assert_eq!(fetched.clinic_id, clinic.id);

        let err = store.fetch_clinic(RecordId::new()).expect_err("should be missing");
        assert!(matches!(err, CaseError::NotFound { entity: "clinic", .. }));
    }
}
