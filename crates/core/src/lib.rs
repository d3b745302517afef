//! # Portal Core
//!
//! Core business logic for the clinic portal of a genetic-testing laboratory.
//!
//! This crate contains the case status lifecycle and the requisition/consent
//! workflow:
//! - Requisition validation and case + consent creation
//! - Operator-driven status transitions
//! - Report upload and the `report_ready` transition
//! - Supply-order creation with non-fatal lab notification
//!
//! Persistence, blob storage, authentication and notification delivery are
//! external collaborators consumed through the traits in [`stores`];
//! implementations live in `portal-store` and `portal-files`.
//!
//! **No API concerns**: HTTP servers, session extraction from requests, or
//! OpenAPI schemas belong in `api-rest` and `api-shared`.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod orders;
pub mod report;
pub mod requisition;
pub mod session;
pub mod stores;

#[cfg(test)]
mod test_support;

pub use config::CoreConfig;
pub use error::{CaseError, CaseResult};
pub use lifecycle::CaseLifecycleService;
pub use model::{
    Case, CaseFilter, CaseStatus, Clinic, Consent, Indication, KitOrder, KitOrderItems,
    KitOrderStatus, NewCase, NewConsent, NewKitOrder, PersonDetails, Provider, ReportAttachment,
    SignerRole, SpermSource, TestType, User, UserRole,
};
pub use orders::{KitOrderForm, KitOrderService};
pub use report::{ReportService, ReportUploadOutcome};
pub use requisition::{
    validate_requisition, KaryotypeUpload, RequisitionDraft, RequisitionService,
    RequisitionViolation,
};
pub use session::SessionContext;
pub use stores::{
    CaseStore, ConsentStore, DocumentStore, KitOrderStore, LogNotifier, Notification, Notifier,
    ReferenceDirectory, StoredDocument,
};

// Re-export the identifier type so downstream crates rarely need a direct
// portal-uuid dependency.
pub use portal_uuid::RecordId;
