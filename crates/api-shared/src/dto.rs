//! Request and response bodies for the REST surface.
//!
//! Enum-valued fields travel as their snake_case string forms and are parsed
//! into the domain enums on the way in; file contents travel base64-encoded
//! inside the JSON body. Conversion failures carry the offending field name
//! so handlers can return a useful 400.

use base64::{engine::general_purpose, Engine as _};
use chrono::NaiveDate;
use portal_core::{
    Case, Consent, KaryotypeUpload, KitOrder, KitOrderForm, KitOrderItems, PersonDetails,
    RequisitionDraft,
};
use portal_types::{EmailAddress, NonEmptyText};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A request field that could not be converted into its domain type.
#[derive(Debug, thiserror::Error)]
#[error("invalid value for '{field}': {reason}")]
pub struct DtoError {
    pub field: &'static str,
    pub reason: String,
}

fn invalid(field: &'static str, reason: impl ToString) -> DtoError {
    DtoError {
        field,
        reason: reason.to_string(),
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Generic error body; the message is safe to surface to the operator.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

/// A file travelling inside a JSON body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileUpload {
    /// Original filename as chosen by the uploader.
    pub file_name: String,
    /// Base64-encoded file contents (standard alphabet, padded).
    pub content_base64: String,
}

impl FileUpload {
    fn decode(self, field: &'static str) -> Result<KaryotypeUpload, DtoError> {
        let original_filename =
            NonEmptyText::new(&self.file_name).map_err(|e| invalid(field, e))?;
        let bytes = general_purpose::STANDARD
            .decode(self.content_base64.as_bytes())
            .map_err(|e| invalid(field, e))?;
        Ok(KaryotypeUpload {
            original_filename,
            bytes,
        })
    }
}

/// Requisition submission body. Field names mirror the clinic-facing form.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitRequisitionReq {
    pub patient_first_name: String,
    pub patient_last_name: String,
    /// ISO 8601 date (`YYYY-MM-DD`).
    pub patient_date_of_birth: String,
    pub patient_email: String,
    pub patient_phone: Option<String>,

    pub is_egg_donor: bool,
    pub egg_donor_age: Option<u32>,

    pub no_partner: bool,
    /// `partner` or `donor`.
    pub sperm_source: String,
    pub partner_first_name: Option<String>,
    pub partner_last_name: Option<String>,
    pub partner_date_of_birth: Option<String>,
    pub partner_email: Option<String>,
    pub partner_phone: Option<String>,
    pub is_sperm_donor: bool,

    pub ordering_provider_id: String,
    /// Any of `pgt_a`, `pgt_sr`.
    pub tests_ordered: Vec<String>,
    pub indication: Option<String>,
    pub mask_sex_results: bool,
    pub reason_for_testing: Option<String>,

    pub karyotype_file: Option<FileUpload>,
}

/// Trims an optional form field, treating whitespace-only input as absent.
/// Browsers submit empty strings for untouched inputs; those must flow into
/// the cross-field validator as missing, not fail shape validation here.
fn cleaned(value: Option<String>) -> Option<String> {
    value.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        }
    })
}

impl SubmitRequisitionReq {
    /// Converts the wire form into a [`RequisitionDraft`].
    ///
    /// Only field-level shape is checked here (names non-empty, emails and
    /// dates well-formed, enum strings known). Cross-field business rules are
    /// the domain validator's job and are deliberately not anticipated.
    ///
    /// # Errors
    ///
    /// Returns [`DtoError`] naming the first malformed field.
    pub fn into_draft(self) -> Result<RequisitionDraft, DtoError> {
        let patient_first_name = NonEmptyText::new(&self.patient_first_name)
            .map_err(|e| invalid("patient_first_name", e))?;
        let patient_last_name = NonEmptyText::new(&self.patient_last_name)
            .map_err(|e| invalid("patient_last_name", e))?;
        let patient_date_of_birth = self
            .patient_date_of_birth
            .parse::<NaiveDate>()
            .map_err(|e| invalid("patient_date_of_birth", e))?;
        let patient_email =
            EmailAddress::new(&self.patient_email).map_err(|e| invalid("patient_email", e))?;

        let sperm_source = self
            .sperm_source
            .parse()
            .map_err(|e: String| invalid("sperm_source", e))?;

        let partner_first_name = cleaned(self.partner_first_name)
            .map(|s| NonEmptyText::new(&s))
            .transpose()
            .map_err(|e| invalid("partner_first_name", e))?;
        let partner_last_name = cleaned(self.partner_last_name)
            .map(|s| NonEmptyText::new(&s))
            .transpose()
            .map_err(|e| invalid("partner_last_name", e))?;
        let partner_date_of_birth = cleaned(self.partner_date_of_birth)
            .map(|s| s.parse::<NaiveDate>())
            .transpose()
            .map_err(|e| invalid("partner_date_of_birth", e))?;
        let partner_email = cleaned(self.partner_email)
            .map(|s| EmailAddress::new(&s))
            .transpose()
            .map_err(|e| invalid("partner_email", e))?;

        let ordering_provider_id = self
            .ordering_provider_id
            .parse()
            .map_err(|e| invalid("ordering_provider_id", e))?;

        let tests_ordered = self
            .tests_ordered
            .iter()
            .map(|s| s.parse())
            .collect::<Result<Vec<_>, String>>()
            .map_err(|e| invalid("tests_ordered", e))?;

        let indication = cleaned(self.indication)
            .map(|s| s.parse())
            .transpose()
            .map_err(|e: String| invalid("indication", e))?;

        let karyotype = self
            .karyotype_file
            .map(|file| file.decode("karyotype_file"))
            .transpose()?;

        Ok(RequisitionDraft {
            patient_first_name,
            patient_last_name,
            patient_date_of_birth,
            patient_email,
            patient_phone: cleaned(self.patient_phone),

            is_egg_donor: self.is_egg_donor,
            egg_donor_age: self.egg_donor_age,

            no_partner: self.no_partner,
            sperm_source,
            partner_first_name,
            partner_last_name,
            partner_date_of_birth,
            partner_email,
            partner_phone: cleaned(self.partner_phone),
            is_sperm_donor: self.is_sperm_donor,

            ordering_provider_id,
            tests_ordered,
            indication,
            mask_sex_results: self.mask_sex_results,
            reason_for_testing: cleaned(self.reason_for_testing),

            karyotype,
        })
    }
}

/// Patient or partner identity in a case response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PersonRes {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub email: String,
    pub phone: Option<String>,
}

impl From<&PersonDetails> for PersonRes {
    fn from(person: &PersonDetails) -> Self {
        Self {
            first_name: person.first_name.to_string(),
            last_name: person.last_name.to_string(),
            date_of_birth: person.date_of_birth.to_string(),
            email: person.email.to_string(),
            phone: person.phone.clone(),
        }
    }
}

/// One case, as returned by every case-reading endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CaseRes {
    pub id: String,
    pub case_number: String,
    pub clinic_id: String,
    pub submitted_by_user_id: String,

    pub patient: PersonRes,
    pub partner: Option<PersonRes>,

    pub is_egg_donor: bool,
    pub egg_donor_age: Option<u32>,
    pub no_partner: bool,
    pub sperm_source: String,
    pub is_sperm_donor: bool,

    pub ordering_provider_id: String,
    pub tests_ordered: Vec<String>,
    pub indication: String,
    pub mask_sex_results: bool,
    pub reason_for_testing: Option<String>,

    pub karyotype_file_path: Option<String>,

    pub status: String,

    pub report_file_url: Option<String>,
    pub report_file_name: Option<String>,
    pub report_uploaded_at: Option<String>,

    pub created_at: String,
}

impl From<&Case> for CaseRes {
    fn from(case: &Case) -> Self {
        Self {
            id: case.id.to_string(),
            case_number: case.case_number.to_string(),
            clinic_id: case.clinic_id.to_string(),
            submitted_by_user_id: case.submitted_by_user_id.to_string(),
            patient: PersonRes::from(&case.patient),
            partner: case.partner.as_ref().map(PersonRes::from),
            is_egg_donor: case.is_egg_donor,
            egg_donor_age: case.egg_donor_age,
            no_partner: case.no_partner,
            sperm_source: case.sperm_source.to_string(),
            is_sperm_donor: case.is_sperm_donor,
            ordering_provider_id: case.ordering_provider_id.to_string(),
            tests_ordered: case
                .tests_ordered
                .iter()
                .map(|t| t.as_str().to_owned())
                .collect(),
            indication: case.indication.as_str().to_owned(),
            mask_sex_results: case.mask_sex_results,
            reason_for_testing: case.reason_for_testing.clone(),
            karyotype_file_path: case.karyotype_file_path.clone(),
            status: case.status.as_str().to_owned(),
            report_file_url: case.report_file_url.clone(),
            report_file_name: case.report_file_name.clone(),
            report_uploaded_at: case.report_uploaded_at.map(|t| t.to_rfc3339()),
            created_at: case.created_at.to_rfc3339(),
        }
    }
}

/// Case listing response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListCasesRes {
    pub cases: Vec<CaseRes>,
}

/// One consent record for a case.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConsentRes {
    pub id: String,
    pub case_id: String,
    pub signer_role: String,
    pub recipient_name: String,
    pub recipient_email: String,
    pub recipient_phone: Option<String>,
    pub signed_at: Option<String>,
    pub created_at: String,
}

impl From<&Consent> for ConsentRes {
    fn from(consent: &Consent) -> Self {
        Self {
            id: consent.id.to_string(),
            case_id: consent.case_id.to_string(),
            signer_role: consent.signer_role.as_str().to_owned(),
            recipient_name: consent.recipient_name.clone(),
            recipient_email: consent.recipient_email.to_string(),
            recipient_phone: consent.recipient_phone.clone(),
            signed_at: consent.signed_at.map(|t| t.to_rfc3339()),
            created_at: consent.created_at.to_rfc3339(),
        }
    }
}

/// Consent listing response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListConsentsRes {
    pub consents: Vec<ConsentRes>,
}

/// Status transition request body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateStatusReq {
    /// Target status, snake_case (for example `samples_received`).
    pub status: String,
}

/// Report upload request body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadReportReq {
    pub file_name: String,
    /// Base64-encoded report contents.
    pub content_base64: String,
}

impl UploadReportReq {
    /// Decodes the report bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DtoError`] if the content is not valid base64.
    pub fn decode_bytes(&self) -> Result<Vec<u8>, DtoError> {
        general_purpose::STANDARD
            .decode(self.content_base64.as_bytes())
            .map_err(|e| invalid("content_base64", e))
    }
}

/// Report upload response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadReportRes {
    pub case: CaseRes,
    /// How many active clinic users were notified.
    pub notified_users: usize,
}

/// Kit order request body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KitOrderReq {
    pub biopsy_collection_kits: u32,
    pub shipping_containers: u32,
    pub collection_tubes: u32,
    /// Falls back to the clinic's address on file when absent.
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
}

impl KitOrderReq {
    pub fn into_form(self) -> KitOrderForm {
        KitOrderForm {
            items: KitOrderItems {
                biopsy_collection_kits: self.biopsy_collection_kits,
                shipping_containers: self.shipping_containers,
                collection_tubes: self.collection_tubes,
            },
            shipping_address: cleaned(self.shipping_address),
            notes: cleaned(self.notes),
        }
    }
}

/// One kit order, as returned after placement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KitOrderRes {
    pub id: String,
    pub clinic_id: String,
    pub ordered_by_user_id: String,
    pub status: String,
    pub biopsy_collection_kits: u32,
    pub shipping_containers: u32,
    pub collection_tubes: u32,
    pub shipping_address: String,
    pub notes: Option<String>,
    pub created_at: String,
}

impl From<&KitOrder> for KitOrderRes {
    fn from(order: &KitOrder) -> Self {
        Self {
            id: order.id.to_string(),
            clinic_id: order.clinic_id.to_string(),
            ordered_by_user_id: order.ordered_by_user_id.to_string(),
            status: order.status.as_str().to_owned(),
            biopsy_collection_kits: order.items.biopsy_collection_kits,
            shipping_containers: order.items.shipping_containers,
            collection_tubes: order.items.collection_tubes,
            shipping_address: order.shipping_address.clone(),
            notes: order.notes.clone(),
            created_at: order.created_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::{validate_requisition, RequisitionViolation, SpermSource, TestType};

    fn base_req() -> SubmitRequisitionReq {
        SubmitRequisitionReq {
            patient_first_name: "Ana".into(),
            patient_last_name: "Silva".into(),
            patient_date_of_birth: "1990-04-02".into(),
            patient_email: "Ana@Example.org".into(),
            patient_phone: Some("  ".into()),
            is_egg_donor: false,
            egg_donor_age: None,
            no_partner: true,
            sperm_source: "donor".into(),
            partner_first_name: None,
            partner_last_name: None,
            partner_date_of_birth: None,
            partner_email: None,
            partner_phone: None,
            is_sperm_donor: true,
            ordering_provider_id: "550e8400e29b41d4a716446655440000".into(),
            tests_ordered: vec!["pgt_a".into()],
            indication: Some("advanced_maternal_age".into()),
            mask_sex_results: false,
            reason_for_testing: None,
            karyotype_file: None,
        }
    }

    #[test]
    fn into_draft_parses_and_normalises() {
        let draft = base_req().into_draft().unwrap();
        assert_eq!(draft.patient_email.as_str(), "ana@example.org");
        assert_eq!(draft.sperm_source, SpermSource::Donor);
        assert_eq!(draft.tests_ordered, vec![TestType::PgtA]);
        assert_eq!(draft.patient_phone, None, "blank phone becomes absent");
        assert!(validate_requisition(&draft).is_ok());
    }

    #[test]
    fn into_draft_rejects_malformed_email() {
        let mut req = base_req();
        req.patient_email = "not-an-email".into();
        let err = req.into_draft().expect_err("should reject");
        assert_eq!(err.field, "patient_email");
    }

    #[test]
    fn into_draft_rejects_unknown_test_type() {
        let mut req = base_req();
        req.tests_ordered = vec!["pgt_m".into()];
        let err = req.into_draft().expect_err("should reject");
        assert_eq!(err.field, "tests_ordered");
    }

    #[test]
    fn empty_partner_strings_flow_to_the_domain_validator() {
        // Untouched browser inputs arrive as empty strings; they must surface
        // as the business-rule violation, not a field shape error.
        let mut req = base_req();
        req.no_partner = false;
        req.partner_first_name = Some("".into());
        req.partner_last_name = Some("".into());
        req.partner_date_of_birth = Some("".into());
        req.partner_email = Some("".into());

        let draft = req.into_draft().unwrap();
        assert_eq!(
            validate_requisition(&draft),
            Err(RequisitionViolation::IncompletePartnerInfo)
        );
    }

    #[test]
    fn karyotype_file_decodes_base64() {
        let mut req = base_req();
        req.tests_ordered = vec!["pgt_sr".into()];
        req.karyotype_file = Some(FileUpload {
            file_name: "karyotype.png".into(),
            content_base64: general_purpose::STANDARD.encode(b"fake image bytes"),
        });

        let draft = req.into_draft().unwrap();
        let upload = draft.karyotype.expect("karyotype should be present");
        assert_eq!(upload.original_filename.as_str(), "karyotype.png");
        assert_eq!(upload.bytes, b"fake image bytes");
    }

    #[test]
    fn karyotype_file_rejects_invalid_base64() {
        let mut req = base_req();
        req.karyotype_file = Some(FileUpload {
            file_name: "karyotype.png".into(),
            content_base64: "not base64 !!".into(),
        });
        let err = req.into_draft().expect_err("should reject");
        assert_eq!(err.field, "karyotype_file");
    }

    #[test]
    fn kit_order_req_maps_quantities() {
        let form = KitOrderReq {
            biopsy_collection_kits: 3,
            shipping_containers: 1,
            collection_tubes: 20,
            shipping_address: Some(" 1 Main Street ".into()),
            notes: None,
        }
        .into_form();

        assert_eq!(form.items.biopsy_collection_kits, 3);
        assert_eq!(form.shipping_address.as_deref(), Some("1 Main Street"));
    }
}
