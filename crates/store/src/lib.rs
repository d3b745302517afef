//! # Portal Store
//!
//! Disk-backed row storage for the clinic portal. Each table is a sharded
//! directory tree under the data root, with one JSON document per row. The
//! store implements the collaborator traits defined in `portal-core`
//! ([`portal_core::CaseStore`], [`portal_core::ConsentStore`],
//! [`portal_core::KitOrderStore`] and [`portal_core::ReferenceDirectory`]).
//!
//! ## Storage Layout
//!
//! ```text
//! <data_dir>/
//! ├── cases/
//! │   ├── case_counter.json
//! │   └── <s1>/<s2>/<uuid>/row.json
//! ├── consents/
//! │   └── <s1>/<s2>/<uuid>/row.json
//! ├── kit_orders/
//! │   └── <s1>/<s2>/<uuid>/row.json
//! ├── users/
//! ├── clinics/
//! └── providers/
//! ```
//!
//! where `s1`/`s2` are the first four hex characters of the row identifier,
//! providing scalable directory sharding.
//!
//! Rows are written atomically (temp file then rename), so a half-written
//! `row.json` is never observable. Writes across rows are sequential and
//! non-transactional; ordering guarantees live in the workflow code in
//! `portal-core`, not here.

mod json;

pub use json::JsonStore;

/// Errors that can occur inside the row store.
///
/// These never escape as-is from the `portal-core` trait methods; they are
/// boxed into `CaseError::Backend` so the core stays ignorant of storage
/// details.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Data root does not exist or is not a directory
    #[error("Invalid data root: {0}")]
    InvalidDataRoot(String),

    /// A unique row directory could not be allocated
    #[error("Failed to allocate a row directory: {0}")]
    RowAllocation(std::io::Error),

    /// A row or counter document could not be (de)serialised
    #[error("Row serialisation failed: {0}")]
    Serialisation(#[from] serde_json::Error),

    /// A generated case number failed text validation
    #[error("Generated case number was rejected: {0}")]
    CaseNumber(#[from] portal_types::TextError),

    /// The store's write lock was poisoned by a panicking thread
    #[error("Store write lock poisoned")]
    LockPoisoned,

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for portal_core::CaseError {
    fn from(err: StoreError) -> Self {
        portal_core::CaseError::Backend(Box::new(err))
    }
}
