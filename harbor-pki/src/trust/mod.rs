//! OS trust-store synchronization for the root CA certificate.
//!
//! - **Adapters**: one [`TrustStoreAdapter`] per platform (macOS keychains,
//!   Linux anchor directories, Windows certificate stores)
//! - **Detection**: [`detect_platform`] picks the platform once per run
//! - **Synchronizer**: [`TrustSynchronizer`] drives install/remove/status
//!   idempotently by SHA-1 fingerprint
//!
//! Nothing is cached: every entry point re-detects and re-queries.

mod detect;
mod linux;
mod macos;
mod runner;
mod sync;
mod windows;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::inspect::Fingerprint;

pub use detect::{adapter_for, current_platform, detect_platform};
pub use linux::{DEBIAN_ANCHOR_DIR, LinuxAnchorAdapter, RHEL_ANCHOR_DIR, TRUSTED_CA_FILENAME};
pub use macos::{MacKeychainAdapter, SYSTEM_KEYCHAIN};
pub use runner::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
pub use sync::{InstallOutcome, RemoveReport, TrustStatus, TrustSynchronizer};
pub use windows::WindowsCertStoreAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinuxTrustTool {
    /// `update-ca-certificates` with `/usr/local/share/ca-certificates`
    Debian,
    /// `update-ca-trust` with `/etc/pki/ca-trust/source/anchors`
    Rhel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformKind {
    MacOs,
    Linux(LinuxTrustTool),
    Windows,
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformKind::MacOs => f.write_str("macOS keychain"),
            PlatformKind::Linux(LinuxTrustTool::Debian) => f.write_str("Linux (Debian-style anchors)"),
            PlatformKind::Linux(LinuxTrustTool::Rhel) => f.write_str("Linux (RHEL-style anchors)"),
            PlatformKind::Windows => f.write_str("Windows certificate store"),
        }
    }
}

/// One place a platform can hold trusted roots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrustLocation {
    /// Stable identifier (keychain path, anchor file, store path).
    pub id: String,
    pub label: String,
}

impl TrustLocation {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

impl fmt::Display for TrustLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.id)
    }
}

/// Presence of one fingerprint in one location. Always recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrustRecord {
    pub location: TrustLocation,
    pub fingerprint: Fingerprint,
    pub present: bool,
}

impl TrustRecord {
    pub fn describe(&self) -> String {
        let state = if self.present {
            "installed"
        } else {
            "not installed"
        };
        format!("{}: {state}", self.location)
    }
}

pub trait TrustStoreAdapter {
    fn platform(&self) -> PlatformKind;

    /// Every location this adapter knows about.
    fn locations(&self) -> Vec<TrustLocation>;

    /// Where [`TrustStoreAdapter::install`] puts the certificate.
    fn primary_location(&self) -> TrustLocation;

    fn is_present(&self, location: &TrustLocation, fingerprint: &Fingerprint) -> Result<bool>;

    /// Install into the primary location and return it.
    fn install(&self, cert_path: &Path) -> Result<TrustLocation>;

    /// `Ok(false)` when the fingerprint was not there to begin with.
    fn remove_from(&self, location: &TrustLocation, fingerprint: &Fingerprint) -> Result<bool>;

    fn query(&self, fingerprint: &Fingerprint) -> Result<Vec<TrustRecord>> {
        self.locations()
            .into_iter()
            .map(|location| {
                let present = self.is_present(&location, fingerprint)?;
                Ok(TrustRecord {
                    location,
                    fingerprint: fingerprint.clone(),
                    present,
                })
            })
            .collect()
    }

    /// True when any location holds the fingerprint.
    fn query_installed(&self, fingerprint: &Fingerprint) -> Result<bool> {
        Ok(self.query(fingerprint)?.iter().any(|r| r.present))
    }

    /// Attempt every location; one failure does not stop the rest.
    fn remove(&self, fingerprint: &Fingerprint) -> Vec<(TrustLocation, Result<bool>)> {
        self.locations()
            .into_iter()
            .map(|location| {
                let outcome = self.remove_from(&location, fingerprint);
                (location, outcome)
            })
            .collect()
    }

    fn describe_status(&self, fingerprint: &Fingerprint) -> Result<Vec<String>> {
        Ok(self
            .query(fingerprint)?
            .iter()
            .map(TrustRecord::describe)
            .collect())
    }
}
