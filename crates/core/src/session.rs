//! Explicit session context for request handlers.
//!
//! The portal's original design kept the signed-in user and the admin
//! "view as clinic" overlay in ambient state. Here both travel together in a
//! [`SessionContext`] value threaded through every handler: the real actor is
//! always retained for attribution, and impersonation is a pure *effective
//! clinic* override carried alongside it, never a replacement identity.

use crate::error::{CaseError, CaseResult};
use crate::model::{User, UserRole};
use portal_uuid::RecordId;

/// The authenticated actor plus an optional acting-clinic override.
#[derive(Debug, Clone)]
pub struct SessionContext {
    actor: User,
    acting_clinic: Option<RecordId>,
}

impl SessionContext {
    /// A plain session: the actor operates as themselves.
    pub fn new(actor: User) -> Self {
        Self {
            actor,
            acting_clinic: None,
        }
    }

    /// A lab-admin session viewing the portal as a specific clinic.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError::ImpersonationNotPermitted`] unless the actor is a
    /// lab admin; clinic users can never carry an override.
    pub fn acting_as_clinic(actor: User, clinic_id: RecordId) -> CaseResult<Self> {
        if actor.role != UserRole::LabAdmin {
            return Err(CaseError::ImpersonationNotPermitted);
        }
        Ok(Self {
            actor,
            acting_clinic: Some(clinic_id),
        })
    }

    /// The real authenticated user. Writes are always attributed to this
    /// identity regardless of any clinic override.
    pub fn actor(&self) -> &User {
        &self.actor
    }

    /// The clinic this session is effectively operating for: the override if
    /// one is set, otherwise the actor's own clinic.
    pub fn effective_clinic(&self) -> Option<RecordId> {
        self.acting_clinic.or(self.actor.clinic_id)
    }

    /// Like [`effective_clinic`](Self::effective_clinic), but an error when no
    /// clinic is in scope (a lab admin who has not selected a clinic).
    pub fn require_clinic(&self) -> CaseResult<RecordId> {
        self.effective_clinic().ok_or(CaseError::NoClinicContext)
    }

    pub fn is_lab_admin(&self) -> bool {
        self.actor.role == UserRole::LabAdmin
    }

    /// True when a lab admin is viewing as a clinic.
    pub fn is_impersonating(&self) -> bool {
        self.acting_clinic.is_some()
    }
}
