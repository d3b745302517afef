//! # API Shared
//!
//! Shared utilities and definitions for the clinic portal's API surface.
//!
//! Contains:
//! - Request/response DTOs (`dto` module) with their conversions to and from
//!   the `portal-core` domain types
//! - Shared services like `HealthService`
//! - Authentication utilities
//!
//! Used by `api-rest` (and the root runner) for common functionality. The
//! DTOs keep `utoipa` schema derivation out of `portal-core`: the domain
//! crate stays free of API concerns, and the wire representation can evolve
//! without touching the stored row format.

pub mod auth;
pub mod dto;
pub mod health;

pub use dto::{
    CaseRes, ConsentRes, DtoError, ErrorRes, FileUpload, HealthRes, KitOrderReq, KitOrderRes,
    ListCasesRes, ListConsentsRes, PersonRes, SubmitRequisitionReq, UpdateStatusReq,
    UploadReportReq, UploadReportRes,
};
pub use health::HealthService;
