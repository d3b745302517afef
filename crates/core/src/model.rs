//! Domain records for the clinic portal.
//!
//! One `Case` represents one testing cycle for a patient at a clinic. Cases
//! own the status field that drives the lab-side lifecycle; `Consent` rows
//! gate the early part of that lifecycle, one row per required signer.
//!
//! All records serialise with snake_case field and variant names, which is
//! also the on-disk row format used by the store crate.

use chrono::{DateTime, NaiveDate, Utc};
use portal_types::{EmailAddress, NonEmptyText};
use portal_uuid::RecordId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a case.
///
/// The typical progression runs top to bottom, with `cancelled` reachable as
/// a side branch from any non-terminal state. The progression is *not*
/// enforced: lab operators may set any status from any status to correct
/// mistakes. See [`crate::lifecycle::CaseLifecycleService::set_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    RequisitionSubmitted,
    ConsentPending,
    ConsentComplete,
    SamplesReceived,
    InProgress,
    ReportReady,
    Complete,
    Cancelled,
}

impl CaseStatus {
    /// All statuses, in typical progression order (with `cancelled` last).
    pub const ALL: [CaseStatus; 8] = [
        CaseStatus::RequisitionSubmitted,
        CaseStatus::ConsentPending,
        CaseStatus::ConsentComplete,
        CaseStatus::SamplesReceived,
        CaseStatus::InProgress,
        CaseStatus::ReportReady,
        CaseStatus::Complete,
        CaseStatus::Cancelled,
    ];

    /// The snake_case wire/storage name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::RequisitionSubmitted => "requisition_submitted",
            CaseStatus::ConsentPending => "consent_pending",
            CaseStatus::ConsentComplete => "consent_complete",
            CaseStatus::SamplesReceived => "samples_received",
            CaseStatus::InProgress => "in_progress",
            CaseStatus::ReportReady => "report_ready",
            CaseStatus::Complete => "complete",
            CaseStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CaseStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown case status: '{s}'"))
    }
}

/// The two test types the portal's requisition logic distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    /// Aneuploidy screening.
    PgtA,
    /// Structural-rearrangement screening. Requires a karyotype document at
    /// requisition time.
    PgtSr,
}

impl TestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::PgtA => "pgt_a",
            TestType::PgtSr => "pgt_sr",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [TestType::PgtA, TestType::PgtSr]
            .into_iter()
            .find(|test| test.as_str() == s)
            .ok_or_else(|| format!("unknown test type: '{s}'"))
    }
}

/// Clinical indication for ordering PGT, as offered on the requisition form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indication {
    AdvancedMaternalAge,
    RecurrentPregnancyLoss,
    PreviousFailedIvf,
    MaleFactor,
    UnexplainedInfertility,
    PreviousAneuploidConception,
    RepetitiveImplantationFailure,
    ElectivePgtA,
    PgtSr,
    Other,
}

impl Indication {
    /// All indications, in the order the requisition form offers them.
    pub const ALL: [Indication; 10] = [
        Indication::AdvancedMaternalAge,
        Indication::RecurrentPregnancyLoss,
        Indication::PreviousFailedIvf,
        Indication::MaleFactor,
        Indication::UnexplainedInfertility,
        Indication::PreviousAneuploidConception,
        Indication::RepetitiveImplantationFailure,
        Indication::ElectivePgtA,
        Indication::PgtSr,
        Indication::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Indication::AdvancedMaternalAge => "advanced_maternal_age",
            Indication::RecurrentPregnancyLoss => "recurrent_pregnancy_loss",
            Indication::PreviousFailedIvf => "previous_failed_ivf",
            Indication::MaleFactor => "male_factor",
            Indication::UnexplainedInfertility => "unexplained_infertility",
            Indication::PreviousAneuploidConception => "previous_aneuploid_conception",
            Indication::RepetitiveImplantationFailure => "repetitive_implantation_failure",
            Indication::ElectivePgtA => "elective_pgt_a",
            Indication::PgtSr => "pgt_sr",
            Indication::Other => "other",
        }
    }
}

impl fmt::Display for Indication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Indication {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Indication::ALL
            .into_iter()
            .find(|indication| indication.as_str() == s)
            .ok_or_else(|| format!("unknown indication: '{s}'"))
    }
}

/// Where the sperm sample comes from; drives the partner-required rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpermSource {
    Partner,
    Donor,
}

impl SpermSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpermSource::Partner => "partner",
            SpermSource::Donor => "donor",
        }
    }
}

impl fmt::Display for SpermSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpermSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "partner" => Ok(SpermSource::Partner),
            "donor" => Ok(SpermSource::Donor),
            other => Err(format!("unknown sperm source: '{other}'")),
        }
    }
}

/// Which party a consent record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerRole {
    Patient,
    Partner,
}

impl SignerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignerRole::Patient => "patient",
            SignerRole::Partner => "partner",
        }
    }
}

impl fmt::Display for SignerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Portal user role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    ClinicUser,
    LabAdmin,
}

/// Identity fields shared by the patient and (optionally) the partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonDetails {
    pub first_name: NonEmptyText,
    pub last_name: NonEmptyText,
    pub date_of_birth: NaiveDate,
    pub email: EmailAddress,
    pub phone: Option<String>,
}

impl PersonDetails {
    /// "First Last", as used for consent recipient names.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// One testing cycle for a patient at a clinic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub id: RecordId,
    /// Human-readable case number, assigned by the store at insert time.
    pub case_number: NonEmptyText,
    pub clinic_id: RecordId,
    pub submitted_by_user_id: RecordId,

    pub patient: PersonDetails,
    /// Present when partner information was required at requisition time.
    pub partner: Option<PersonDetails>,

    pub is_egg_donor: bool,
    pub egg_donor_age: Option<u32>,
    pub no_partner: bool,
    pub sperm_source: SpermSource,
    pub is_sperm_donor: bool,

    pub ordering_provider_id: RecordId,
    pub tests_ordered: Vec<TestType>,
    pub indication: Indication,
    pub mask_sex_results: bool,
    pub reason_for_testing: Option<String>,

    /// Storage path of the karyotype document, when one was uploaded.
    pub karyotype_file_path: Option<String>,

    pub status: CaseStatus,

    pub report_file_url: Option<String>,
    pub report_file_name: Option<String>,
    pub report_uploaded_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl Case {
    /// True once `pgt_sr` is among the ordered tests.
    pub fn includes_pgt_sr(&self) -> bool {
        self.tests_ordered.contains(&TestType::PgtSr)
    }
}

/// Fields the requisition workflow hands to the store when inserting a case.
///
/// Deliberately has no status field and no case number: the workflow forces
/// the initial status, and the store assigns the case number. Callers cannot
/// smuggle either in.
#[derive(Debug, Clone)]
pub struct NewCase {
    pub clinic_id: RecordId,
    pub submitted_by_user_id: RecordId,
    pub patient: PersonDetails,
    pub partner: Option<PersonDetails>,
    pub is_egg_donor: bool,
    pub egg_donor_age: Option<u32>,
    pub no_partner: bool,
    pub sperm_source: SpermSource,
    pub is_sperm_donor: bool,
    pub ordering_provider_id: RecordId,
    pub tests_ordered: Vec<TestType>,
    pub indication: Indication,
    pub mask_sex_results: bool,
    pub reason_for_testing: Option<String>,
    pub karyotype_file_path: Option<String>,
    pub initial_status: CaseStatus,
    pub created_at: DateTime<Utc>,
}

/// A per-signer record tracking whether a required party has agreed to testing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consent {
    pub id: RecordId,
    pub case_id: RecordId,
    pub signer_role: SignerRole,
    pub recipient_name: String,
    pub recipient_email: EmailAddress,
    pub recipient_phone: Option<String>,
    /// Populated by the external signing flow; null until signed.
    pub signed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new consent row.
#[derive(Debug, Clone)]
pub struct NewConsent {
    pub case_id: RecordId,
    pub signer_role: SignerRole,
    pub recipient_name: String,
    pub recipient_email: EmailAddress,
    pub recipient_phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Report file reference recorded on a case after a successful upload.
#[derive(Debug, Clone)]
pub struct ReportAttachment {
    pub file_url: String,
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Equality filters for listing cases.
#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    pub clinic_id: Option<RecordId>,
    pub status: Option<CaseStatus>,
}

/// A clinic known to the lab.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clinic {
    pub id: RecordId,
    pub name: NonEmptyText,
    pub address: Option<String>,
    pub is_active: bool,
}

/// A portal user, either clinic-side or lab-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: RecordId,
    /// Lab admins are not attached to a clinic.
    pub clinic_id: Option<RecordId>,
    pub first_name: NonEmptyText,
    pub last_name: NonEmptyText,
    pub email: EmailAddress,
    pub role: UserRole,
    pub is_active: bool,
}

/// An ordering provider at a clinic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: RecordId,
    pub clinic_id: RecordId,
    pub first_name: NonEmptyText,
    pub last_name: NonEmptyText,
    pub credentials: Option<String>,
    pub is_active: bool,
}

/// Supply quantities on a kit order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitOrderItems {
    pub biopsy_collection_kits: u32,
    pub shipping_containers: u32,
    pub collection_tubes: u32,
}

/// Lifecycle state of a kit order. Fulfilment happens off-portal; this core
/// only creates `pending` orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KitOrderStatus {
    Pending,
    Shipped,
    Delivered,
}

impl KitOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KitOrderStatus::Pending => "pending",
            KitOrderStatus::Shipped => "shipped",
            KitOrderStatus::Delivered => "delivered",
        }
    }
}

impl fmt::Display for KitOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A clinic's supply order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KitOrder {
    pub id: RecordId,
    pub clinic_id: RecordId,
    pub ordered_by_user_id: RecordId,
    pub status: KitOrderStatus,
    pub items: KitOrderItems,
    pub shipping_address: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new kit order row.
#[derive(Debug, Clone)]
pub struct NewKitOrder {
    pub clinic_id: RecordId,
    pub ordered_by_user_id: RecordId,
    pub items: KitOrderItems,
    pub shipping_address: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
