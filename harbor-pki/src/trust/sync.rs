//! Idempotent install/remove/status of the root certificate by fingerprint.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{PlatformKind, TrustLocation, TrustRecord, TrustStoreAdapter};
use crate::error::{PkiError, Result};
use crate::inspect::{Fingerprint, fingerprint_file};

#[derive(Debug, Clone, Serialize)]
pub struct TrustStatus {
    pub platform: String,
    pub cert_file: PathBuf,
    pub fingerprint: Fingerprint,
    /// True when any location holds the certificate.
    pub installed: bool,
    pub records: Vec<TrustRecord>,
    #[serde(skip)]
    pub details: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    AlreadyInstalled(TrustLocation),
    Installed(TrustLocation),
}

#[derive(Debug)]
pub struct RemoveReport {
    pub fingerprint: Fingerprint,
    pub removed: Vec<TrustLocation>,
    pub absent: Vec<TrustLocation>,
    pub failures: Vec<(TrustLocation, PkiError)>,
}

impl RemoveReport {
    /// Absent everywhere and nothing failed.
    pub fn not_found(&self) -> bool {
        self.removed.is_empty() && self.failures.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct TrustSynchronizer<'a> {
    adapter: &'a dyn TrustStoreAdapter,
    cert_file: PathBuf,
}

impl<'a> TrustSynchronizer<'a> {
    pub fn new(adapter: &'a dyn TrustStoreAdapter, cert_file: impl Into<PathBuf>) -> Self {
        Self {
            adapter,
            cert_file: cert_file.into(),
        }
    }

    pub fn cert_file(&self) -> &Path {
        &self.cert_file
    }

    pub fn platform(&self) -> PlatformKind {
        self.adapter.platform()
    }

    /// Recomputed from the file on every call.
    pub fn fingerprint(&self) -> Result<Fingerprint> {
        fingerprint_file(&self.cert_file)
    }

    pub fn status(&self) -> Result<TrustStatus> {
        let fingerprint = self.fingerprint()?;
        let records = self.adapter.query(&fingerprint)?;
        let details = records.iter().map(TrustRecord::describe).collect();
        Ok(TrustStatus {
            platform: self.adapter.platform().to_string(),
            cert_file: self.cert_file.clone(),
            installed: records.iter().any(|r| r.present),
            fingerprint,
            records,
            details,
        })
    }

    /// Only the primary location decides whether anything needs doing.
    pub fn install(&self) -> Result<InstallOutcome> {
        let fingerprint = self.fingerprint()?;
        let primary = self.adapter.primary_location();
        if self.adapter.is_present(&primary, &fingerprint)? {
            tracing::info!(
                location = %primary,
                fingerprint = %fingerprint,
                "Root CA already trusted"
            );
            return Ok(InstallOutcome::AlreadyInstalled(primary));
        }
        let location = self.adapter.install(&self.cert_file)?;
        Ok(InstallOutcome::Installed(location))
    }

    /// Tries every location; failures are collected rather than returned early.
    pub fn remove(&self) -> Result<RemoveReport> {
        let fingerprint = self.fingerprint()?;
        let mut report = RemoveReport {
            fingerprint: fingerprint.clone(),
            removed: Vec::new(),
            absent: Vec::new(),
            failures: Vec::new(),
        };
        for (location, outcome) in self.adapter.remove(&fingerprint) {
            match outcome {
                Ok(true) => report.removed.push(location),
                Ok(false) => report.absent.push(location),
                Err(err) => {
                    tracing::warn!(location = %location, error = %err, "Failed to remove root CA");
                    report.failures.push((location, err));
                }
            }
        }
        Ok(report)
    }
}
