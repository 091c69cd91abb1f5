//! macOS keychains via the `security` tool.
//!
//! Presence is checked in both the login and the System keychain; install
//! only ever targets the login keychain so no administrator rights are needed.

use std::path::{Path, PathBuf};

use super::runner::{CommandRunner, CommandSpec};
use super::{PlatformKind, TrustLocation, TrustStoreAdapter};
use crate::error::{PkiError, Result};
use crate::inspect::Fingerprint;

pub const SYSTEM_KEYCHAIN: &str = "/Library/Keychains/System.keychain";
const LOGIN_KEYCHAIN_RELATIVE: &str = "Library/Keychains/login.keychain-db";
const SECURITY: &str = "security";

pub struct MacKeychainAdapter<'r> {
    runner: &'r dyn CommandRunner,
    login: PathBuf,
    system: PathBuf,
}

impl<'r> MacKeychainAdapter<'r> {
    pub fn new(runner: &'r dyn CommandRunner) -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            PkiError::PlatformUnsupported(
                "could not determine home directory for the login keychain".to_string(),
            )
        })?;
        Ok(Self::with_keychains(
            runner,
            home.join(LOGIN_KEYCHAIN_RELATIVE),
            PathBuf::from(SYSTEM_KEYCHAIN),
        ))
    }

    pub fn with_keychains(
        runner: &'r dyn CommandRunner,
        login: impl Into<PathBuf>,
        system: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            login: login.into(),
            system: system.into(),
        }
    }

    fn login_location(&self) -> TrustLocation {
        TrustLocation::new(self.login.display().to_string(), "login keychain")
    }

    fn system_location(&self) -> TrustLocation {
        TrustLocation::new(self.system.display().to_string(), "System keychain")
    }

    fn is_system(&self, location: &TrustLocation) -> bool {
        Path::new(&location.id) == self.system
    }
}

/// SHA-1 hashes from `security find-certificate -a -Z` output.
pub(crate) fn parse_sha1_hashes(output: &str) -> Vec<Fingerprint> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("SHA-1 hash:"))
        .filter_map(|value| Fingerprint::parse(value.trim()).ok())
        .collect()
}

impl TrustStoreAdapter for MacKeychainAdapter<'_> {
    fn platform(&self) -> PlatformKind {
        PlatformKind::MacOs
    }

    fn locations(&self) -> Vec<TrustLocation> {
        vec![self.login_location(), self.system_location()]
    }

    fn primary_location(&self) -> TrustLocation {
        self.login_location()
    }

    fn is_present(&self, location: &TrustLocation, fingerprint: &Fingerprint) -> Result<bool> {
        let spec = CommandSpec::new(SECURITY).args([
            "find-certificate",
            "-a",
            "-Z",
            location.id.as_str(),
        ]);
        let output = self.runner.run_checked(&spec)?;
        Ok(parse_sha1_hashes(&output.stdout).contains(fingerprint))
    }

    fn install(&self, cert_path: &Path) -> Result<TrustLocation> {
        if !cert_path.is_file() {
            return Err(PkiError::CertFileMissing(cert_path.to_path_buf()));
        }
        let location = self.login_location();
        let spec = CommandSpec::new(SECURITY)
            .args(["add-trusted-cert", "-r", "trustRoot", "-k", location.id.as_str()])
            .arg(cert_path);
        self.runner.run_checked(&spec)?;
        tracing::info!(
            keychain = %location.id,
            cert_path = %cert_path.display(),
            "Added root CA to keychain"
        );
        Ok(location)
    }

    fn remove_from(&self, location: &TrustLocation, fingerprint: &Fingerprint) -> Result<bool> {
        if !self.is_present(location, fingerprint)? {
            return Ok(false);
        }

        let mut spec = CommandSpec::new(SECURITY).args([
            "delete-certificate",
            "-Z",
            fingerprint.as_str(),
            location.id.as_str(),
        ]);
        if self.is_system(location) && !self.runner.is_elevated() {
            if !self.runner.tool_exists("sudo") {
                return Err(PkiError::PrivilegeRequired(format!(
                    "removing from {} requires administrator rights and sudo is unavailable",
                    location.id
                )));
            }
            spec = spec.elevated();
        }
        self.runner.run_checked(&spec)?;
        tracing::info!(
            keychain = %location.id,
            fingerprint = %fingerprint,
            "Removed root CA from keychain"
        );
        Ok(true)
    }
}
