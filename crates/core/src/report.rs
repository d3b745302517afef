//! The report upload workflow.
//!
//! Attaches a finished report file to a case and marks it ready for clinic
//! pickup. The steps run in a fixed order so that a failure early in the
//! sequence never leaves a half-updated case:
//!
//! 1. store the file under `reports/{clinic_id}/` — failure here leaves the
//!    case completely untouched;
//! 2. record the file reference and force status to `report_ready` — failure
//!    here leaves an orphaned blob, which is logged and not retried;
//! 3. resolve the clinic's active users and dispatch a report-ready
//!    notification — failure here is swallowed, the upload already succeeded.

use crate::error::{CaseError, CaseResult};
use crate::model::{Case, ReportAttachment};
use crate::requisition::file_extension;
use crate::stores::{CaseStore, DocumentStore, Notification, Notifier, ReferenceDirectory};
use chrono::Utc;
use portal_uuid::RecordId;
use std::sync::Arc;

/// Outcome of a successful report upload.
#[derive(Debug, Clone)]
pub struct ReportUploadOutcome {
    /// The refreshed case, now `report_ready`.
    pub case: Case,
    /// How many clinic users the notification was addressed to.
    pub notified_users: usize,
}

/// Stores report files and advances cases to `report_ready`.
#[derive(Clone)]
pub struct ReportService {
    cases: Arc<dyn CaseStore>,
    documents: Arc<dyn DocumentStore>,
    directory: Arc<dyn ReferenceDirectory>,
    notifier: Arc<dyn Notifier>,
}

impl ReportService {
    pub fn new(
        cases: Arc<dyn CaseStore>,
        documents: Arc<dyn DocumentStore>,
        directory: Arc<dyn ReferenceDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            cases,
            documents,
            directory,
            notifier,
        }
    }

    /// Uploads `bytes` as the case's report and forces status to
    /// `report_ready` regardless of the prior status.
    ///
    /// The storage path embeds the case number and a millisecond timestamp
    /// (`reports/{clinic_id}/{case_number}_report_{timestamp}.{ext}`) so a
    /// re-upload never overwrites a prior report.
    ///
    /// # Errors
    ///
    /// - `CaseError::NotFound` when the case does not exist; nothing is
    ///   stored.
    /// - `CaseError::DocumentStorage` when the blob write fails; the case is
    ///   left unmodified.
    /// - A collaborator error when recording the reference fails after the
    ///   blob was stored; the orphaned blob is logged, not deleted.
    pub fn upload_report(
        &self,
        case_id: RecordId,
        original_filename: &str,
        bytes: &[u8],
    ) -> CaseResult<ReportUploadOutcome> {
        let case = self.cases.fetch_case(case_id)?;

        let now = Utc::now();
        let ext = file_extension(original_filename);
        let path = format!(
            "reports/{}/{}_report_{}.{}",
            case.clinic_id,
            case.case_number,
            now.timestamp_millis(),
            ext
        );

        let stored = self.documents.store(&path, original_filename, bytes)?;

        let attach_result = self.cases.attach_report(
            case.id,
            ReportAttachment {
                file_url: stored.public_url.clone(),
                file_name: original_filename.to_owned(),
                uploaded_at: now,
            },
        );

        let case = match attach_result {
            Ok(case) => case,
            Err(error) => {
                tracing::error!(
                    case_id = %case.id,
                    blob_path = %stored.path,
                    %error,
                    "case update failed after report blob was stored; blob is orphaned"
                );
                return Err(error);
            }
        };

        let notified_users = self.notify_clinic(&case);

        tracing::info!(
            case_id = %case.id,
            case_number = %case.case_number,
            notified_users,
            "report uploaded"
        );

        Ok(ReportUploadOutcome {
            case,
            notified_users,
        })
    }

    /// Addresses a report-ready notification to the clinic's active users.
    /// Any failure is logged and swallowed; returns the recipient count.
    fn notify_clinic(&self, case: &Case) -> usize {
        let recipients = match self.directory.active_users_for_clinic(case.clinic_id) {
            Ok(users) => users.into_iter().map(|u| u.email).collect::<Vec<_>>(),
            Err(error) => {
                tracing::warn!(case_id = %case.id, %error, "could not resolve notification recipients");
                return 0;
            }
        };

        let clinic_name = match self.directory.fetch_clinic(case.clinic_id) {
            Ok(clinic) => clinic.name.to_string(),
            Err(_) => case.clinic_id.to_string(),
        };

        let count = recipients.len();
        let notification = Notification::ReportReady {
            recipients,
            clinic_name,
            case_number: case.case_number.to_string(),
        };

        if let Err(error) = self.notifier.notify(&notification) {
            tracing::warn!(case_id = %case.id, %error, "report-ready notification failed");
        }

        count
    }
}
