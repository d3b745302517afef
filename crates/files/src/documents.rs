//! Disk-backed document storage service.
//!
//! [`DocumentService`] is the portal's implementation of the core's
//! [`DocumentStore`] collaborator trait: upload-by-path under a validated
//! root, with a public-URL mapping and an integrity-metadata sidecar per
//! document.
//!
//! # Security Model
//!
//! - The root is canonicalised at construction and must already exist
//! - Relative paths are validated segment by segment; `..`, absolute paths,
//!   backslashes and empty segments are rejected before any I/O
//! - Documents are never overwritten

use crate::DocumentError;
use chrono::{DateTime, Utc};
use portal_core::{CaseError, CaseResult, DocumentStore, StoredDocument};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Metadata sidecar for a stored document.
///
/// Serialised to JSON next to the document itself (`<path>.meta.json`). It
/// provides an auditable record of the stored bytes without any patient or
/// clinical identifiers beyond what the path already carries.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// Hashing algorithm used (always "sha256" for the current implementation)
    pub hash_algorithm: String,

    /// Hexadecimal digest of the document content
    pub hash: String,

    /// Path relative to the documents root where the document is stored
    pub relative_path: String,

    /// Size of the document in bytes
    pub size_bytes: u64,

    /// Detected media type (MIME type), if available
    ///
    /// This is a best-effort detection and should not be considered
    /// authoritative. May be `None` if the media type cannot be determined.
    pub media_type: Option<String>,

    /// Original filename as submitted by the uploader
    pub original_filename: String,

    /// UTC timestamp when the document was stored
    pub stored_at: DateTime<Utc>,
}

/// Service for storing and retrieving portal documents on local disk.
#[derive(Debug, Clone)]
pub struct DocumentService {
    root_directory: PathBuf,
    public_base_url: String,
}

impl DocumentService {
    /// Creates a new `DocumentService` over an existing root directory.
    ///
    /// # Arguments
    ///
    /// * `root_directory` - Directory all documents are stored under
    /// * `public_base_url` - URL prefix documents are served from (trailing
    ///   slash stripped)
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::InvalidRootDirectory` if the root does not
    /// exist, is not a directory, or cannot be canonicalised.
    pub fn new(root_directory: &Path, public_base_url: &str) -> Result<Self, DocumentError> {
        if !root_directory.exists() {
            return Err(DocumentError::InvalidRootDirectory(format!(
                "Directory does not exist: {}",
                root_directory.display()
            )));
        }

        if !root_directory.is_dir() {
            return Err(DocumentError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root_directory.display()
            )));
        }

        let root_directory = root_directory.canonicalize().map_err(|e| {
            DocumentError::InvalidRootDirectory(format!(
                "Cannot canonicalise path {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        Ok(Self {
            root_directory,
            public_base_url: public_base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Stores `bytes` at `relative_path` and writes the metadata sidecar.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError` if:
    /// - the path fails validation (traversal, absolute, empty segment)
    /// - a document already exists at the path (immutability violation)
    /// - directory creation, the document write, or the sidecar write fails
    pub fn store_document(
        &self,
        relative_path: &str,
        original_filename: &str,
        bytes: &[u8],
    ) -> Result<DocumentMetadata, DocumentError> {
        let target = self.resolve(relative_path)?;

        if target.exists() {
            return Err(DocumentError::DocumentAlreadyExists(
                relative_path.to_owned(),
            ));
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                DocumentError::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create document directory {}: {}",
                        parent.display(),
                        e
                    ),
                ))
            })?;
        }

        fs::write(&target, bytes).map_err(|e| {
            DocumentError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write document to {}: {}", target.display(), e),
            ))
        })?;

        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let hash = hex::encode(hasher.finalize());

        let media_type = infer::get(bytes).map(|kind| kind.mime_type().to_owned());

        let metadata = DocumentMetadata {
            hash_algorithm: "sha256".into(),
            hash,
            relative_path: relative_path.to_owned(),
            size_bytes: bytes.len() as u64,
            media_type,
            original_filename: original_filename.to_owned(),
            stored_at: Utc::now(),
        };

        let sidecar = sidecar_path(&target);
        let json = serde_json::to_vec_pretty(&metadata)?;
        fs::write(&sidecar, json).map_err(|e| {
            DocumentError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write metadata to {}: {}", sidecar.display(), e),
            ))
        })?;

        Ok(metadata)
    }

    /// Reads a previously stored document's bytes.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::DocumentNotFound` if nothing is stored at the
    /// path, or an I/O error if the read fails.
    pub fn read_document(&self, relative_path: &str) -> Result<Vec<u8>, DocumentError> {
        let target = self.resolve(relative_path)?;

        if !target.exists() {
            return Err(DocumentError::DocumentNotFound(relative_path.to_owned()));
        }

        fs::read(&target).map_err(|e| {
            DocumentError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read document from {}: {}", target.display(), e),
            ))
        })
    }

    /// Reads the metadata sidecar for a stored document.
    pub fn read_metadata(&self, relative_path: &str) -> Result<DocumentMetadata, DocumentError> {
        let target = self.resolve(relative_path)?;
        let sidecar = sidecar_path(&target);

        if !sidecar.exists() {
            return Err(DocumentError::DocumentNotFound(relative_path.to_owned()));
        }

        let bytes = fs::read(&sidecar)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// The externally reachable URL for a stored document.
    pub fn public_url(&self, relative_path: &str) -> String {
        format!("{}/{}", self.public_base_url, relative_path)
    }

    /// Validates `relative_path` and joins it onto the root.
    ///
    /// Rejects absolute paths, backslashes, `.`/`..` components and empty
    /// segments so a stored document can never escape the root.
    fn resolve(&self, relative_path: &str) -> Result<PathBuf, DocumentError> {
        if relative_path.is_empty() {
            return Err(DocumentError::InvalidPath("path is empty".into()));
        }

        if relative_path.contains('\\') {
            return Err(DocumentError::InvalidPath(format!(
                "backslashes are not allowed: '{relative_path}'"
            )));
        }

        if relative_path.starts_with('/') || relative_path.ends_with('/') {
            return Err(DocumentError::InvalidPath(format!(
                "path must be relative with no trailing slash: '{relative_path}'"
            )));
        }

        if relative_path.split('/').any(|segment| segment.is_empty()) {
            return Err(DocumentError::InvalidPath(format!(
                "empty path segment: '{relative_path}'"
            )));
        }

        let candidate = Path::new(relative_path);
        let safe = candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(DocumentError::InvalidPath(format!(
                "path may only contain plain segments: '{relative_path}'"
            )));
        }

        Ok(self.root_directory.join(candidate))
    }
}

fn sidecar_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".meta.json");
    target.with_file_name(name)
}

impl DocumentStore for DocumentService {
    fn store(
        &self,
        path: &str,
        original_filename: &str,
        bytes: &[u8],
    ) -> CaseResult<StoredDocument> {
        let metadata = self
            .store_document(path, original_filename, bytes)
            .map_err(|e| CaseError::DocumentStorage(Box::new(e)))?;

        Ok(StoredDocument {
            public_url: self.public_url(&metadata.relative_path),
            path: metadata.relative_path,
        })
    }
}
