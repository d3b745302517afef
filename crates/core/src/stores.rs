//! Collaborator seams.
//!
//! Persistence, blob storage and notification dispatch are delegated to a
//! hosted backend; the core consumes them through the traits in this module
//! and never buffers writes locally or retries automatically. Implementations
//! live in the `portal-store` and `portal-files` crates; tests use in-memory
//! doubles.
//!
//! All multi-row operations are sequential, not transactional. Where the
//! workflows depend on ordering (upload before update, case before consents),
//! the ordering lives in the workflow code, not here.

use crate::error::CaseResult;
use crate::model::{
    Case, CaseFilter, CaseStatus, Clinic, Consent, KitOrder, KitOrderItems, NewCase, NewConsent,
    NewKitOrder, Provider, ReportAttachment, User,
};
use chrono::{DateTime, Utc};
use portal_types::EmailAddress;
use portal_uuid::RecordId;

/// Row operations against the `cases` table.
pub trait CaseStore: Send + Sync {
    /// Inserts a new case, assigning its id and case number, and returns the
    /// stored row.
    fn insert_case(&self, new_case: NewCase) -> CaseResult<Case>;

    /// Fetches one case by id, or `CaseError::NotFound`.
    fn fetch_case(&self, id: RecordId) -> CaseResult<Case>;

    /// Lists cases matching the filter, newest first.
    fn list_cases(&self, filter: &CaseFilter) -> CaseResult<Vec<Case>>;

    /// Overwrites the status field and returns the refreshed row. The write
    /// must be atomic per case; last write wins across concurrent operators.
    fn update_status(&self, id: RecordId, status: CaseStatus) -> CaseResult<Case>;

    /// Records a report file reference and forces status to `report_ready`,
    /// returning the refreshed row. Atomic per case.
    fn attach_report(&self, id: RecordId, attachment: ReportAttachment) -> CaseResult<Case>;
}

/// Row operations against the `consents` table.
pub trait ConsentStore: Send + Sync {
    /// Inserts a consent row. At most one row may exist per
    /// (case, signer role); a second insert for the same pair fails with
    /// `CaseError::DuplicateConsent`.
    fn insert_consent(&self, new_consent: NewConsent) -> CaseResult<Consent>;

    /// All consent rows for a case.
    fn consents_for_case(&self, case_id: RecordId) -> CaseResult<Vec<Consent>>;

    /// Populates `signed_at`. Write-back hook for the external signing flow.
    fn mark_signed(&self, consent_id: RecordId, at: DateTime<Utc>) -> CaseResult<Consent>;
}

/// Row operations against the `kit_orders` table.
pub trait KitOrderStore: Send + Sync {
    fn insert_order(&self, new_order: NewKitOrder) -> CaseResult<KitOrder>;
}

/// Read access to clinics, users and providers.
///
/// Administration of these records is out of scope for the core; it only
/// resolves references and targets notifications.
pub trait ReferenceDirectory: Send + Sync {
    fn fetch_user(&self, id: RecordId) -> CaseResult<User>;
    fn fetch_clinic(&self, id: RecordId) -> CaseResult<Clinic>;
    fn fetch_provider(&self, id: RecordId) -> CaseResult<Provider>;

    /// Active users attached to a clinic, for notification targeting.
    fn active_users_for_clinic(&self, clinic_id: RecordId) -> CaseResult<Vec<User>>;
}

/// A document stored by the blob collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    /// Storage path the document was written under.
    pub path: String,
    /// Externally reachable URL for the document.
    pub public_url: String,
}

/// Upload-by-path blob storage.
pub trait DocumentStore: Send + Sync {
    /// Stores `bytes` under `path` (relative, `/`-separated) and returns the
    /// stored document's path and public URL. Never overwrites: callers embed
    /// a collision-resistant suffix in the path.
    fn store(&self, path: &str, original_filename: &str, bytes: &[u8])
        -> CaseResult<StoredDocument>;
}

/// Structured payload handed to the out-of-process notification function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A finished report is ready for clinic pickup.
    ReportReady {
        recipients: Vec<EmailAddress>,
        clinic_name: String,
        case_number: String,
    },
    /// A clinic placed a supply order.
    KitOrderPlaced {
        to: EmailAddress,
        clinic_name: String,
        clinic_contact: EmailAddress,
        order_id: RecordId,
        items: KitOrderItems,
        shipping_address: String,
        notes: Option<String>,
    },
}

/// Notification dispatch. Invocation failure is always non-fatal to the
/// primary write; callers log and carry on.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> CaseResult<()>;
}

/// Production notifier: logs the payload and reports success.
///
/// Actual delivery (email via the hosted function) is an external concern;
/// this mirrors the observed behaviour of the system this portal fronts.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) -> CaseResult<()> {
        match notification {
            Notification::ReportReady {
                recipients,
                clinic_name,
                case_number,
            } => tracing::info!(
                clinic = %clinic_name,
                case_number = %case_number,
                recipients = recipients.len(),
                "report-ready notification"
            ),
            Notification::KitOrderPlaced {
                to,
                clinic_name,
                order_id,
                ..
            } => tracing::info!(
                to = %to,
                clinic = %clinic_name,
                order = %order_id,
                "kit-order notification"
            ),
        }
        Ok(())
    }
}
