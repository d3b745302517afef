//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses.

use crate::{CaseError, CaseResult};
use portal_types::EmailAddress;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    documents_dir: PathBuf,
    public_base_url: String,
    lab_order_email: EmailAddress,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// `public_base_url` is the externally reachable prefix under which stored
    /// documents are served; a trailing slash is stripped so path joining is
    /// uniform.
    pub fn new(
        data_dir: PathBuf,
        documents_dir: PathBuf,
        public_base_url: String,
        lab_order_email: EmailAddress,
    ) -> CaseResult<Self> {
        let public_base_url = public_base_url.trim_end_matches('/').to_owned();
        if public_base_url.is_empty() {
            return Err(CaseError::Backend(
                "public_base_url cannot be empty".into(),
            ));
        }

        Ok(Self {
            data_dir,
            documents_dir,
            public_base_url,
            lab_order_email,
        })
    }

    /// Root directory for the table-shaped row store.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Root directory for uploaded documents (karyotypes, reports).
    pub fn documents_dir(&self) -> &Path {
        &self.documents_dir
    }

    /// Externally reachable URL prefix for stored documents, without a
    /// trailing slash.
    pub fn public_base_url(&self) -> &str {
        &self.public_base_url
    }

    /// Address the supply-order notification is dispatched to.
    pub fn lab_order_email(&self) -> &EmailAddress {
        &self.lab_order_email
    }
}
