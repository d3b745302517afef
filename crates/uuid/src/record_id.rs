//! Internal implementation of the canonical record identifier.

use crate::{IdError, IdResult};
use std::path::{Path, PathBuf};
use std::{fmt, str::FromStr};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

/// The portal's canonical record identifier (32 lowercase hex characters, no hyphens).
///
/// This wrapper type guarantees that once constructed, the contained UUID is in
/// canonical format. It provides type safety for identifier operations and
/// ensures consistent path derivation across the system.
///
/// # When to use this type
/// Use this wrapper whenever you are:
/// - Accepting an identifier string from *outside* the core (CLI input, API
///   request, etc), or
/// - Deriving a sharded storage path for a row, or
/// - Generating new row identifiers.
///
/// Once you have a `RecordId`, you can safely assume the internal UUID is
/// valid and in canonical form.
///
/// # Construction
/// - [`RecordId::new`] generates a new canonical identifier (for new rows).
/// - [`RecordId::parse`] validates an externally supplied identifier.
///
/// # Display format
/// When displayed or converted to string, `RecordId` always produces the
/// canonical 32-character lowercase hex format without hyphens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(Uuid);

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordId {
    /// Generates a new identifier in canonical form.
    ///
    /// This is suitable for allocating a fresh identifier when inserting a row.
    /// The generated UUID follows RFC 4122 version 4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses an identifier string that must already be in canonical form.
    ///
    /// This does **not** normalise other common UUID forms (for example,
    /// hyphenated or uppercase). Callers must provide the canonical
    /// representation. This strict validation ensures consistency and prevents
    /// issues with different representations of the same identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidInput`] if `input` is not 32 lowercase hex
    /// characters.
    pub fn parse(input: &str) -> IdResult<Self> {
        if Self::is_canonical(input) {
            // is_canonical guarantees valid hex, so parse_str cannot fail
            let uuid = Uuid::parse_str(input)
                .map_err(|e| IdError::InvalidInput(format!("unparseable identifier: {e}")))?;
            return Ok(Self(uuid));
        }
        Err(IdError::InvalidInput(format!(
            "identifier must be 32 lowercase hex characters without hyphens, got: '{}'",
            input
        )))
    }

    /// Returns the identifier as a `uuid::Uuid`.
    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Returns true if `input` is in canonical form.
    ///
    /// This is a purely syntactic check that validates:
    /// - Exactly 32 bytes long
    /// - Contains only lowercase hex characters (`0-9` and `a-f`)
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// Returns `parent_dir/<s1>/<s2>/<id>/` where `s1`/`s2` are derived from this identifier.
    ///
    /// This implements the portal's sharding scheme:
    /// - `s1` is the first two hex characters of the identifier
    /// - `s2` is the next two hex characters
    /// - The full identifier forms the leaf directory
    ///
    /// Sharding prevents filesystem performance issues when many rows
    /// accumulate under a single table directory.
    pub fn sharded_dir(&self, parent_dir: &Path) -> PathBuf {
        let canonical = self.0.simple().to_string();
        let s1 = &canonical[0..2];
        let s2 = &canonical[2..4];
        parent_dir.join(s1).join(s2).join(&canonical)
    }
}

impl fmt::Display for RecordId {
    /// Formats the identifier in canonical form (32 lowercase hex characters, no hyphens).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for RecordId {
    type Err = IdError;

    /// Parses a string into a `RecordId`, requiring canonical form.
    ///
    /// This is equivalent to calling [`RecordId::parse`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordId::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for RecordId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RecordId::parse(&s).map_err(serde::de::Error::custom)
    }
}
