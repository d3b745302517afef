//! Portal Document Storage
//!
//! This crate provides blob storage for the clinic portal's uploaded
//! documents: karyotype files attached at requisition time and finished
//! report files uploaded by the lab.
//!
//! ## Design Principles
//!
//! - Documents are stored under caller-chosen paths partitioned by clinic
//!   (and, for reports, case number), never content-addressed: the paths are
//!   part of the portal's external contract.
//! - Documents are immutable once stored; callers embed a collision-resistant
//!   suffix (a millisecond timestamp) in the path, and an existing target is
//!   an error rather than an overwrite.
//! - Every stored document gets a metadata sidecar recording its SHA-256
//!   digest, size, sniffed media type, original filename and storage time, so
//!   integrity can be audited without any row-store lookup.
//! - All paths are validated against the storage root; traversal components
//!   are rejected before any I/O.
//!
//! ## Storage Layout
//!
//! ```text
//! <documents_root>/
//! ├── <clinic_id>/
//! │   └── 1756300000000_karyotype.png
//! │   └── 1756300000000_karyotype.png.meta.json
//! └── reports/
//!     └── <clinic_id>/
//!         ├── AG-2026-0042_report_1756300000000.pdf
//!         └── AG-2026-0042_report_1756300000000.pdf.meta.json
//! ```

mod documents;

pub use documents::{DocumentMetadata, DocumentService};

/// Errors that can occur during document operations
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Root directory does not exist or is not a directory
    #[error("Invalid documents root: {0}")]
    InvalidRootDirectory(String),

    /// Path validation failed (potential directory traversal or unsafe path)
    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    /// A document already exists at the target path (immutability violation)
    #[error("A document already exists at '{0}'")]
    DocumentAlreadyExists(String),

    /// No document exists at the requested path
    #[error("No document at '{0}'")]
    DocumentNotFound(String),

    /// Metadata sidecar could not be serialised
    #[error("Failed to serialise document metadata: {0}")]
    MetadataSerialisation(#[from] serde_json::Error),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
