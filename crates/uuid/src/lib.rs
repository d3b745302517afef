//! Record identifiers and sharded-path utilities.
//!
//! The portal's on-disk store keeps one directory per row, sharded by the
//! row's identifier.
//!
//! To keep path derivation deterministic and consistent across the codebase,
//! the portal uses a *canonical* identifier representation: **32 lowercase
//! hexadecimal characters** (no hyphens).
//!
//! This module provides:
//! - A small wrapper type ([`RecordId`]) that *guarantees* the canonical
//!   format once constructed.
//! - Shared sharding logic to derive row directory locations from an
//!   identifier.
//!
//! ## Canonical form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! Notes:
//! - This is the same value you would get from `Uuid::new_v4().simple().to_string()`.
//! - Canonical form is *required* for externally supplied identifiers (for
//!   example, from CLI/API inputs). Use [`RecordId::parse`] to validate an
//!   input string.
//! - Non-canonical values (uppercase, hyphenated, wrong length, non-hex) are
//!   rejected.
//!
//! ## Sharded directory layout
//! For a canonical identifier `u`, rows live under:
//! `parent_dir/<u[0..2]>/<u[2..4]>/<u>/`
//!
//! This scheme prevents very large fan-out in a single directory.

mod record_id;

pub use record_id::{RecordId, Uuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type IdResult<T> = Result<T, IdError>;
