//! The requisition workflow.
//!
//! Transforms clinic-submitted form data into a persisted [`Case`] plus its
//! [`Consent`] record(s). Cross-field validation is a pure function evaluated
//! before any side effect, so the precedence of the business rules is testable
//! in isolation from I/O; the side effects then run in a fixed order
//! (karyotype upload, case insert, consent inserts).
//!
//! The case and consent inserts are sequential, not transactional: a consent
//! insert failing after the case insert succeeded leaves a case without its
//! consent row(s). This mirrors the hosted backend's client contract; the
//! failure is logged with the case id and the error propagated.

use crate::error::{CaseError, CaseResult};
use crate::model::{Case, CaseStatus, NewCase, NewConsent, PersonDetails, SignerRole};
use crate::model::{Indication, SpermSource, TestType};
use crate::session::SessionContext;
use crate::stores::{CaseStore, ConsentStore, DocumentStore, ReferenceDirectory};
use chrono::{NaiveDate, Utc};
use portal_types::{EmailAddress, NonEmptyText};
use portal_uuid::RecordId;
use std::sync::Arc;

/// A karyotype document attached to the requisition form.
#[derive(Debug, Clone)]
pub struct KaryotypeUpload {
    pub original_filename: NonEmptyText,
    pub bytes: Vec<u8>,
}

/// Clinic-submitted requisition form data, prior to validation.
///
/// Field-level shape (non-empty names, well-formed emails, parseable dates)
/// is guaranteed by the types; this struct exists so the *cross-field* rules
/// can be checked over the whole draft at once.
#[derive(Debug, Clone)]
pub struct RequisitionDraft {
    pub patient_first_name: NonEmptyText,
    pub patient_last_name: NonEmptyText,
    pub patient_date_of_birth: NaiveDate,
    pub patient_email: EmailAddress,
    pub patient_phone: Option<String>,

    pub is_egg_donor: bool,
    pub egg_donor_age: Option<u32>,

    pub no_partner: bool,
    pub sperm_source: SpermSource,
    pub partner_first_name: Option<NonEmptyText>,
    pub partner_last_name: Option<NonEmptyText>,
    pub partner_date_of_birth: Option<NaiveDate>,
    pub partner_email: Option<EmailAddress>,
    pub partner_phone: Option<String>,
    pub is_sperm_donor: bool,

    pub ordering_provider_id: RecordId,
    pub tests_ordered: Vec<TestType>,
    pub indication: Option<Indication>,
    pub mask_sex_results: bool,
    pub reason_for_testing: Option<String>,

    pub karyotype: Option<KaryotypeUpload>,
}

impl RequisitionDraft {
    /// Partner information is mandatory unless **both** "no partner" is
    /// flagged **and** the sperm source is a donor.
    pub fn partner_required(&self) -> bool {
        !self.no_partner || self.sperm_source == SpermSource::Partner
    }

    /// Assembles the partner identity when all four required partner fields
    /// are present; `None` otherwise.
    pub fn partner_details(&self) -> Option<PersonDetails> {
        Some(PersonDetails {
            first_name: self.partner_first_name.clone()?,
            last_name: self.partner_last_name.clone()?,
            date_of_birth: self.partner_date_of_birth?,
            email: self.partner_email.clone()?,
            phone: self.partner_phone.clone(),
        })
    }

    fn patient_details(&self) -> PersonDetails {
        PersonDetails {
            first_name: self.patient_first_name.clone(),
            last_name: self.patient_last_name.clone(),
            date_of_birth: self.patient_date_of_birth,
            email: self.patient_email.clone(),
            phone: self.patient_phone.clone(),
        }
    }
}

/// A business rule the draft violates.
///
/// The messages are surfaced verbatim to the operator, one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RequisitionViolation {
    #[error("at least one test must be ordered")]
    NoTestsOrdered,
    #[error("an indication for PGT must be selected")]
    MissingIndication,
    #[error("egg donor age is required when the egg donor flag is set")]
    MissingEggDonorAge,
    #[error(
        "partner information is required (first name, last name, date of birth, and email; phone is optional)"
    )]
    IncompletePartnerInfo,
    #[error("partner email must be different from patient email (used for separate consent)")]
    PartnerEmailMatchesPatient,
    #[error("a karyotype document must be uploaded for PGT-SR")]
    MissingKaryotypeDocument,
}

/// Validates the draft against the cross-field business rules.
///
/// Fails fast, surfacing exactly one violation at a time, in this precedence:
/// empty tests, missing indication, missing egg-donor age, incomplete or
/// duplicate partner info, missing karyotype for PGT-SR. Pure: no I/O, no
/// side effects.
pub fn validate_requisition(draft: &RequisitionDraft) -> Result<(), RequisitionViolation> {
    if draft.tests_ordered.is_empty() {
        return Err(RequisitionViolation::NoTestsOrdered);
    }

    if draft.indication.is_none() {
        return Err(RequisitionViolation::MissingIndication);
    }

    if draft.is_egg_donor && draft.egg_donor_age.is_none() {
        return Err(RequisitionViolation::MissingEggDonorAge);
    }

    if draft.partner_required() {
        let partner = draft
            .partner_details()
            .ok_or(RequisitionViolation::IncompletePartnerInfo)?;

        // EmailAddress is lowercase-normalised, so plain equality is the
        // case-insensitive comparison.
        if partner.email == draft.patient_email {
            return Err(RequisitionViolation::PartnerEmailMatchesPatient);
        }
    }

    if draft.tests_ordered.contains(&TestType::PgtSr) && draft.karyotype.is_none() {
        return Err(RequisitionViolation::MissingKaryotypeDocument);
    }

    Ok(())
}

/// Extension of `filename` after its last dot, or "pdf" when there is none.
pub(crate) fn file_extension(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext,
        _ => "pdf",
    }
}

/// Creates cases and their consent rows from validated requisition drafts.
#[derive(Clone)]
pub struct RequisitionService {
    cases: Arc<dyn CaseStore>,
    consents: Arc<dyn ConsentStore>,
    documents: Arc<dyn DocumentStore>,
    directory: Arc<dyn ReferenceDirectory>,
}

impl RequisitionService {
    pub fn new(
        cases: Arc<dyn CaseStore>,
        consents: Arc<dyn ConsentStore>,
        documents: Arc<dyn DocumentStore>,
        directory: Arc<dyn ReferenceDirectory>,
    ) -> Self {
        Self {
            cases,
            consents,
            documents,
            directory,
        }
    }

    /// Validates and persists one requisition.
    ///
    /// On success the new case has status `consent_pending` (forced; the
    /// draft carries no status field), one patient consent row, and a partner
    /// consent row iff partner information was required.
    ///
    /// # Errors
    ///
    /// - [`CaseError::Validation`] before any write, for the first violated
    ///   rule in precedence order.
    /// - [`CaseError::ProviderNotAvailable`] when the ordering provider is
    ///   inactive or belongs to a different clinic.
    /// - Collaborator errors from the document upload or the inserts; a
    ///   failed karyotype upload aborts before the case insert, while a
    ///   failed consent insert leaves the already-created case in place.
    pub fn submit(&self, session: &SessionContext, draft: RequisitionDraft) -> CaseResult<Case> {
        validate_requisition(&draft)?;

        let clinic_id = session.require_clinic()?;

        let provider = self.directory.fetch_provider(draft.ordering_provider_id)?;
        if provider.clinic_id != clinic_id || !provider.is_active {
            return Err(CaseError::ProviderNotAvailable);
        }

        let indication = draft
            .indication
            .ok_or(RequisitionViolation::MissingIndication)?;

        let partner = if draft.partner_required() {
            let details = draft
                .partner_details()
                .ok_or(RequisitionViolation::IncompletePartnerInfo)?;
            Some(details)
        } else {
            None
        };

        let now = Utc::now();

        let karyotype_file_path = match &draft.karyotype {
            Some(doc) => {
                let ext = file_extension(doc.original_filename.as_str());
                let path = format!("{}/{}_karyotype.{}", clinic_id, now.timestamp_millis(), ext);
                let stored = self
                    .documents
                    .store(&path, doc.original_filename.as_str(), &doc.bytes)?;
                Some(stored.path)
            }
            None => None,
        };

        let case = self.cases.insert_case(NewCase {
            clinic_id,
            submitted_by_user_id: session.actor().id,
            patient: draft.patient_details(),
            partner: partner.clone(),
            is_egg_donor: draft.is_egg_donor,
            egg_donor_age: draft.egg_donor_age,
            no_partner: draft.no_partner,
            sperm_source: draft.sperm_source,
            is_sperm_donor: draft.is_sperm_donor,
            ordering_provider_id: draft.ordering_provider_id,
            tests_ordered: draft.tests_ordered.clone(),
            indication,
            mask_sex_results: draft.mask_sex_results,
            reason_for_testing: draft.reason_for_testing.clone(),
            karyotype_file_path,
            initial_status: CaseStatus::ConsentPending,
            created_at: now,
        })?;

        tracing::info!(case_id = %case.id, case_number = %case.case_number, "requisition submitted");

        self.insert_consent_or_log(&case, SignerRole::Patient, &case.patient)?;

        if let Some(partner) = &partner {
            self.insert_consent_or_log(&case, SignerRole::Partner, partner)?;
        }

        Ok(case)
    }

    fn insert_consent_or_log(
        &self,
        case: &Case,
        signer_role: SignerRole,
        recipient: &PersonDetails,
    ) -> CaseResult<()> {
        let result = self.consents.insert_consent(NewConsent {
            case_id: case.id,
            signer_role,
            recipient_name: recipient.full_name(),
            recipient_email: recipient.email.clone(),
            recipient_phone: recipient.phone.clone(),
            created_at: Utc::now(),
        });

        if let Err(error) = &result {
            // The case row already exists; the store offers no transaction to
            // roll it back. Leave the inconsistency visible and loud.
            tracing::error!(
                case_id = %case.id,
                signer = %signer_role,
                %error,
                "consent insert failed after case insert; case has no {} consent row",
                signer_role
            );
        }

        result.map(|_| ())
    }
}
