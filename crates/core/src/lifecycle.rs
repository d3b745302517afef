//! Operator-driven case lifecycle operations.

use crate::error::CaseResult;
use crate::model::{Case, CaseStatus, Consent};
use crate::stores::{CaseStore, ConsentStore};
use chrono::{DateTime, Utc};
use portal_uuid::RecordId;
use std::sync::Arc;

/// Applies operator-requested status changes and serves the consent read
/// path operators use when judging whether `consent_complete` is appropriate.
#[derive(Clone)]
pub struct CaseLifecycleService {
    cases: Arc<dyn CaseStore>,
    consents: Arc<dyn ConsentStore>,
}

impl CaseLifecycleService {
    pub fn new(cases: Arc<dyn CaseStore>, consents: Arc<dyn ConsentStore>) -> Self {
        Self { cases, consents }
    }

    /// Writes `target` over the case's current status and returns the
    /// refreshed case.
    ///
    /// Deliberately permissive: any status may be written from any current
    /// status, including moving backwards or out of `cancelled`. Lab
    /// operators use this to correct mistakes, so no forward-only state
    /// machine is enforced. The write is atomic per case; concurrent
    /// operators are last-write-wins.
    ///
    /// # Errors
    ///
    /// Propagates `CaseError::NotFound` for an unknown case and any
    /// collaborator error unchanged.
    pub fn set_status(&self, case_id: RecordId, target: CaseStatus) -> CaseResult<Case> {
        let case = self.cases.update_status(case_id, target)?;
        tracing::info!(case_id = %case.id, status = %target, "case status updated");
        Ok(case)
    }

    /// All consent rows for a case.
    pub fn consents_for_case(&self, case_id: RecordId) -> CaseResult<Vec<Consent>> {
        self.consents.consents_for_case(case_id)
    }

    /// Records that a consent was signed at `at`.
    ///
    /// The signing flow itself is an external collaborator; this is its
    /// write-back hook.
    pub fn mark_consent_signed(
        &self,
        consent_id: RecordId,
        at: DateTime<Utc>,
    ) -> CaseResult<Consent> {
        self.consents.mark_signed(consent_id, at)
    }

    /// Fetches one case.
    pub fn fetch_case(&self, case_id: RecordId) -> CaseResult<Case> {
        self.cases.fetch_case(case_id)
    }

    /// Lists cases, optionally filtered by clinic and status, newest first.
    pub fn list_cases(&self, filter: &crate::model::CaseFilter) -> CaseResult<Vec<Case>> {
        self.cases.list_cases(filter)
    }
}
