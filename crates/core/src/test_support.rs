//! In-memory collaborator doubles for workflow tests.
//!
//! One [`TestBackend`] stands in for every collaborator trait at once, with
//! switches to induce the failure modes the workflows must survive (blob
//! write failure, consent insert failure, notifier failure).

use crate::config::CoreConfig;
use crate::error::{CaseError, CaseResult};
use crate::lifecycle::CaseLifecycleService;
use crate::model::{
    Case, CaseFilter, CaseStatus, Clinic, Consent, Indication, KitOrder, KitOrderStatus, NewCase,
    NewConsent, NewKitOrder, PersonDetails, Provider, ReportAttachment, SignerRole, SpermSource,
    TestType, User, UserRole,
};
use crate::orders::KitOrderService;
use crate::report::ReportService;
use crate::requisition::{RequisitionDraft, RequisitionService};
use crate::session::SessionContext;
use crate::stores::{
    CaseStore, ConsentStore, DocumentStore, KitOrderStore, Notification, Notifier,
    ReferenceDirectory, StoredDocument,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use portal_types::{EmailAddress, NonEmptyText};
use portal_uuid::RecordId;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct State {
    cases: Mutex<Vec<Case>>,
    consents: Mutex<Vec<Consent>>,
    kit_orders: Mutex<Vec<KitOrder>>,
    users: Mutex<Vec<User>>,
    clinics: Mutex<Vec<Clinic>>,
    providers: Mutex<Vec<Provider>>,
    documents: Mutex<Vec<StoredDocument>>,
    notifications: Mutex<Vec<Notification>>,
    case_seq: Mutex<u32>,
    fail_next_document_store: AtomicBool,
    fail_next_consent_insert: AtomicBool,
    fail_notifications: AtomicBool,
}

/// Shared in-memory backend; clones share state.
#[derive(Clone)]
pub(crate) struct TestBackend {
    state: Arc<State>,
    clinic_id: RecordId,
    other_provider_id: RecordId,
    provider_id: RecordId,
    user_id: RecordId,
}

fn text(s: &str) -> NonEmptyText {
    NonEmptyText::new(s).unwrap()
}

fn email(s: &str) -> EmailAddress {
    EmailAddress::new(s).unwrap()
}

impl TestBackend {
    pub fn new() -> Self {
        let state = Arc::new(State::default());
        let clinic_id = RecordId::new();
        let other_clinic_id = RecordId::new();
        let provider_id = RecordId::new();
        let other_provider_id = RecordId::new();
        let user_id = RecordId::new();

        state.clinics.lock().unwrap().extend([
            Clinic {
                id: clinic_id,
                name: text("Bright Fertility"),
                address: Some("1 Main Street".into()),
                is_active: true,
            },
            Clinic {
                id: other_clinic_id,
                name: text("Elsewhere IVF"),
                address: None,
                is_active: true,
            },
        ]);

        state.providers.lock().unwrap().extend([
            Provider {
                id: provider_id,
                clinic_id,
                first_name: text("Dana"),
                last_name: text("Reyes"),
                credentials: Some("MD".into()),
                is_active: true,
            },
            Provider {
                id: other_provider_id,
                clinic_id: other_clinic_id,
                first_name: text("Kai"),
                last_name: text("Nilsen"),
                credentials: None,
                is_active: true,
            },
        ]);

        state.users.lock().unwrap().push(User {
            id: user_id,
            clinic_id: Some(clinic_id),
            first_name: text("Robin"),
            last_name: text("Okafor"),
            email: email("robin@brightfertility.org"),
            role: UserRole::ClinicUser,
            is_active: true,
        });

        Self {
            state,
            clinic_id,
            other_provider_id,
            provider_id,
            user_id,
        }
    }

    fn as_arc(&self) -> Arc<TestBackend> {
        Arc::new(self.clone())
    }

    pub fn config(&self) -> Arc<CoreConfig> {
        Arc::new(
            CoreConfig::new(
                PathBuf::from("/tmp/portal-test/data"),
                PathBuf::from("/tmp/portal-test/docs"),
                "https://files.test".into(),
                email("lab@example.org"),
            )
            .unwrap(),
        )
    }

    pub fn requisition_service(&self) -> RequisitionService {
        RequisitionService::new(self.as_arc(), self.as_arc(), self.as_arc(), self.as_arc())
    }

    pub fn lifecycle_service(&self) -> CaseLifecycleService {
        CaseLifecycleService::new(self.as_arc(), self.as_arc())
    }

    pub fn report_service(&self) -> ReportService {
        ReportService::new(self.as_arc(), self.as_arc(), self.as_arc(), self.as_arc())
    }

    pub fn kit_order_service(&self) -> KitOrderService {
        KitOrderService::new(self.config(), self.as_arc(), self.as_arc(), self.as_arc())
    }

    pub fn clinic_session(&self) -> SessionContext {
        let user = self.fetch_user(self.user_id).unwrap();
        SessionContext::new(user)
    }

    pub fn clinic_id(&self) -> RecordId {
        self.clinic_id
    }

    pub fn clinic_address(&self) -> String {
        "1 Main Street".into()
    }

    pub fn other_clinic_provider_id(&self) -> RecordId {
        self.other_provider_id
    }

    pub fn case_count(&self) -> usize {
        self.state.cases.lock().unwrap().len()
    }

    pub fn consent_count(&self) -> usize {
        self.state.consents.lock().unwrap().len()
    }

    pub fn kit_order_count(&self) -> usize {
        self.state.kit_orders.lock().unwrap().len()
    }

    pub fn document_count(&self) -> usize {
        self.state.documents.lock().unwrap().len()
    }

    pub fn notification_count(&self) -> usize {
        self.state.notifications.lock().unwrap().len()
    }

    pub fn last_document_path(&self) -> Option<String> {
        self.state
            .documents
            .lock()
            .unwrap()
            .last()
            .map(|d| d.path.clone())
    }

    pub fn consents_for_case(&self, case_id: RecordId) -> Vec<Consent> {
        ConsentStore::consents_for_case(self, case_id).unwrap()
    }

    pub fn stored_case(&self, id: RecordId) -> Case {
        self.fetch_case(id).unwrap()
    }

    pub fn fail_next_document_store(&self) {
        self.state
            .fail_next_document_store
            .store(true, Ordering::SeqCst);
    }

    pub fn fail_next_consent_insert(&self) {
        self.state
            .fail_next_consent_insert
            .store(true, Ordering::SeqCst);
    }

    pub fn fail_notifications(&self) {
        self.state.fail_notifications.store(true, Ordering::SeqCst);
    }

    /// Inserts a ready-made case directly, bypassing the workflow.
    pub fn seed_case(&self, status: CaseStatus) -> Case {
        let case = Case {
            id: RecordId::new(),
            case_number: text("AG-2026-0042"),
            clinic_id: self.clinic_id,
            submitted_by_user_id: self.user_id,
            patient: PersonDetails {
                first_name: text("Ana"),
                last_name: text("Silva"),
                date_of_birth: NaiveDate::from_ymd_opt(1991, 6, 14).unwrap(),
                email: email("patient@example.org"),
                phone: None,
            },
            partner: None,
            is_egg_donor: false,
            egg_donor_age: None,
            no_partner: true,
            sperm_source: SpermSource::Donor,
            is_sperm_donor: true,
            ordering_provider_id: self.provider_id,
            tests_ordered: vec![TestType::PgtA],
            indication: Indication::AdvancedMaternalAge,
            mask_sex_results: false,
            reason_for_testing: None,
            karyotype_file_path: None,
            status,
            report_file_url: None,
            report_file_name: None,
            report_uploaded_at: None,
            created_at: Utc::now(),
        };
        self.state.cases.lock().unwrap().push(case.clone());
        case
    }

    pub fn seed_consent(&self, case_id: RecordId, signer_role: SignerRole) -> Consent {
        let consent = Consent {
            id: RecordId::new(),
            case_id,
            signer_role,
            recipient_name: "Ana Silva".into(),
            recipient_email: email("patient@example.org"),
            recipient_phone: None,
            signed_at: None,
            created_at: Utc::now(),
        };
        self.state.consents.lock().unwrap().push(consent.clone());
        consent
    }

    pub fn seed_clinic_user(&self, is_active: bool) -> User {
        let user = User {
            id: RecordId::new(),
            clinic_id: Some(self.clinic_id),
            first_name: text("Noa"),
            last_name: text("Lindt"),
            email: email(&format!("user-{}@brightfertility.org", RecordId::new())),
            role: UserRole::ClinicUser,
            is_active,
        };
        self.state.users.lock().unwrap().push(user.clone());
        user
    }
}

/// A complete, valid draft where partner info is not required.
pub(crate) fn draft_no_partner(backend: &TestBackend) -> RequisitionDraft {
    RequisitionDraft {
        patient_first_name: text("Ana"),
        patient_last_name: text("Silva"),
        patient_date_of_birth: NaiveDate::from_ymd_opt(1991, 6, 14).unwrap(),
        patient_email: email("patient@example.org"),
        patient_phone: Some("+44 20 7946 0000".into()),
        is_egg_donor: false,
        egg_donor_age: None,
        no_partner: true,
        sperm_source: SpermSource::Donor,
        partner_first_name: None,
        partner_last_name: None,
        partner_date_of_birth: None,
        partner_email: None,
        partner_phone: None,
        is_sperm_donor: true,
        ordering_provider_id: backend.provider_id,
        tests_ordered: vec![TestType::PgtA],
        indication: Some(Indication::AdvancedMaternalAge),
        mask_sex_results: false,
        reason_for_testing: None,
        karyotype: None,
    }
}

/// A complete, valid draft with full partner information.
pub(crate) fn draft_with_partner(backend: &TestBackend) -> RequisitionDraft {
    RequisitionDraft {
        no_partner: false,
        sperm_source: SpermSource::Partner,
        partner_first_name: Some(text("Mara")),
        partner_last_name: Some(text("Silva")),
        partner_date_of_birth: Some(NaiveDate::from_ymd_opt(1989, 2, 3).unwrap()),
        partner_email: Some(email("partner@example.org")),
        partner_phone: None,
        is_sperm_donor: false,
        ..draft_no_partner(backend)
    }
}

fn backend_error(message: &str) -> CaseError {
    CaseError::Backend(message.to_owned().into())
}

impl CaseStore for TestBackend {
    fn insert_case(&self, new_case: NewCase) -> CaseResult<Case> {
        let mut seq = self.state.case_seq.lock().unwrap();
        *seq += 1;
        let case_number = text(&format!("AG-{}-{:04}", new_case.created_at.year(), *seq));

        let case = Case {
            id: RecordId::new(),
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
        self.state.cases.lock().unwrap().push(case.clone());
        Ok(case)
    }

    fn fetch_case(&self, id: RecordId) -> CaseResult<Case> {
        self.state
            .cases
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(CaseError::NotFound {
                entity: "case",
                id: id.to_string(),
            })
    }

    fn list_cases(&self, filter: &CaseFilter) -> CaseResult<Vec<Case>> {
        let mut cases: Vec<Case> = self
            .state
            .cases
            .lock()
            .unwrap()
            .iter()
            .filter(|c| filter.clinic_id.map_or(true, |id| c.clinic_id == id))
            .filter(|c| filter.status.map_or(true, |s| c.status == s))
            .cloned()
            .collect();
        cases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(cases)
    }

    fn update_status(&self, id: RecordId, status: CaseStatus) -> CaseResult<Case> {
        let mut cases = self.state.cases.lock().unwrap();
        let case = cases
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(CaseError::NotFound {
                entity: "case",
                id: id.to_string(),
            })?;
        case.status = status;
        Ok(case.clone())
    }

    fn attach_report(&self, id: RecordId, attachment: ReportAttachment) -> CaseResult<Case> {
        let mut cases = self.state.cases.lock().unwrap();
        let case = cases
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(CaseError::NotFound {
                entity: "case",
                id: id.to_string(),
            })?;
        case.report_file_url = Some(attachment.file_url);
        case.report_file_name = Some(attachment.file_name);
        case.report_uploaded_at = Some(attachment.uploaded_at);
        case.status = CaseStatus::ReportReady;
        Ok(case.clone())
    }
}

impl ConsentStore for TestBackend {
    fn insert_consent(&self, new_consent: NewConsent) -> CaseResult<Consent> {
        if self
            .state
            .fail_next_consent_insert
            .swap(false, Ordering::SeqCst)
        {
            return Err(backend_error("induced consent insert failure"));
        }

        let mut consents = self.state.consents.lock().unwrap();
        if consents
            .iter()
            .any(|c| c.case_id == new_consent.case_id && c.signer_role == new_consent.signer_role)
        {
            return Err(CaseError::DuplicateConsent);
        }

        let consent = Consent {
            id: RecordId::new(),
            case_id: new_consent.case_id,
            signer_role: new_consent.signer_role,
            recipient_name: new_consent.recipient_name,
            recipient_email: new_consent.recipient_email,
            recipient_phone: new_consent.recipient_phone,
            signed_at: None,
            created_at: new_consent.created_at,
        };
        consents.push(consent.clone());
        Ok(consent)
    }

    fn consents_for_case(&self, case_id: RecordId) -> CaseResult<Vec<Consent>> {
        Ok(self
            .state
            .consents
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.case_id == case_id)
            .cloned()
            .collect())
    }

    fn mark_signed(&self, consent_id: RecordId, at: DateTime<Utc>) -> CaseResult<Consent> {
        let mut consents = self.state.consents.lock().unwrap();
        let consent = consents
            .iter_mut()
            .find(|c| c.id == consent_id)
            .ok_or(CaseError::NotFound {
                entity: "consent",
                id: consent_id.to_string(),
            })?;
        consent.signed_at = Some(at);
        Ok(consent.clone())
    }
}

impl KitOrderStore for TestBackend {
    fn insert_order(&self, new_order: NewKitOrder) -> CaseResult<KitOrder> {
        let order = KitOrder {
            id: RecordId::new(),
            clinic_id: new_order.clinic_id,
            ordered_by_user_id: new_order.ordered_by_user_id,
            status: KitOrderStatus::Pending,
            items: new_order.items,
            shipping_address: new_order.shipping_address,
            notes: new_order.notes,
            created_at: new_order.created_at,
        };
        self.state.kit_orders.lock().unwrap().push(order.clone());
        Ok(order)
    }
}

impl ReferenceDirectory for TestBackend {
    fn fetch_user(&self, id: RecordId) -> CaseResult<User> {
        self.state
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or(CaseError::NotFound {
                entity: "user",
                id: id.to_string(),
            })
    }

    fn fetch_clinic(&self, id: RecordId) -> CaseResult<Clinic> {
        self.state
            .clinics
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(CaseError::NotFound {
                entity: "clinic",
                id: id.to_string(),
            })
    }

    fn fetch_provider(&self, id: RecordId) -> CaseResult<Provider> {
        self.state
            .providers
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(CaseError::NotFound {
                entity: "provider",
                id: id.to_string(),
            })
    }

    fn active_users_for_clinic(&self, clinic_id: RecordId) -> CaseResult<Vec<User>> {
        Ok(self
            .state
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.clinic_id == Some(clinic_id) && u.is_active)
            .cloned()
            .collect())
    }
}

impl DocumentStore for TestBackend {
    fn store(
        &self,
        path: &str,
        _original_filename: &str,
        _bytes: &[u8],
    ) -> CaseResult<StoredDocument> {
        if self
            .state
            .fail_next_document_store
            .swap(false, Ordering::SeqCst)
        {
            return Err(CaseError::DocumentStorage(
                "induced document store failure".into(),
            ));
        }

        let stored = StoredDocument {
            path: path.to_owned(),
            public_url: format!("https://files.test/{path}"),
        };
        self.state.documents.lock().unwrap().push(stored.clone());
        Ok(stored)
    }
}

impl Notifier for TestBackend {
    fn notify(&self, notification: &Notification) -> CaseResult<()> {
        if self.state.fail_notifications.load(Ordering::SeqCst) {
            return Err(CaseError::Notification(
                "induced notification failure".into(),
            ));
        }
        self.state
            .notifications
            .lock()
            .unwrap()
            .push(notification.clone());
        Ok(())
    }
}
