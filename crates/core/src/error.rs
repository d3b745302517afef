use crate::requisition::RequisitionViolation;

/// A boxed collaborator error.
///
/// The core never inspects backend failures beyond reporting them; storage and
/// document collaborators box whatever they produce into one of the wrapping
/// variants below.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum CaseError {
    /// A business rule was violated before any write took place.
    #[error("{0}")]
    Validation(#[from] RequisitionViolation),

    /// A referenced row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The ordering provider exists but is inactive or belongs to another clinic.
    #[error("ordering provider is not available for this clinic")]
    ProviderNotAvailable,

    /// A consent row already exists for this case and signer role.
    #[error("a consent already exists for this case and signer role")]
    DuplicateConsent,

    /// The session carries no clinic: a lab admin must select a clinic to act
    /// as before submitting clinic-scoped operations.
    #[error("no clinic in session context")]
    NoClinicContext,

    /// Only lab admins may act as another clinic.
    #[error("acting as a clinic requires the lab admin role")]
    ImpersonationNotPermitted,

    #[error("invalid identifier: {0}")]
    InvalidId(#[from] portal_uuid::IdError),

    #[error("storage backend error: {0}")]
    Backend(#[source] CollaboratorError),

    #[error("failed to store document: {0}")]
    DocumentStorage(#[source] CollaboratorError),

    #[error("notification dispatch failed: {0}")]
    Notification(#[source] CollaboratorError),
}

pub type CaseResult<T> = std::result::Result<T, CaseError>;
