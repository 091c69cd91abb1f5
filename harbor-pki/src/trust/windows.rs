//! Windows certificate stores through PowerShell's `Cert:` provider.
//!
//! Parameters travel in environment variables so paths and thumbprints are
//! never spliced into script text. Scripts report absence with exit code 3.

use std::path::Path;

use super::runner::{CommandOutput, CommandRunner, CommandSpec};
use super::{PlatformKind, TrustLocation, TrustStoreAdapter};
use crate::error::{PkiError, Result};
use crate::inspect::{Fingerprint, fingerprint_file};

/// Preferred first.
pub(crate) const SHELL_CANDIDATES: [&str; 2] = ["pwsh", "powershell"];

pub(crate) const ENV_STORE: &str = "HARBOR_TRUST_STORE";
pub(crate) const ENV_THUMBPRINT: &str = "HARBOR_TRUST_THUMBPRINT";
pub(crate) const ENV_CERT: &str = "HARBOR_TRUST_CERT";

const EXIT_ABSENT: i32 = 3;

pub(crate) const QUERY_SCRIPT: &str = "$p = Join-Path $env:HARBOR_TRUST_STORE $env:HARBOR_TRUST_THUMBPRINT; \
     if (Test-Path -LiteralPath $p) { exit 0 } else { exit 3 }";

pub(crate) const INSTALL_SCRIPT: &str = "$ErrorActionPreference = 'Stop'; \
     Import-Certificate -FilePath $env:HARBOR_TRUST_CERT -CertStoreLocation $env:HARBOR_TRUST_STORE | Out-Null";

pub(crate) const REMOVE_SCRIPT: &str = "$ErrorActionPreference = 'Stop'; \
     $p = Join-Path $env:HARBOR_TRUST_STORE $env:HARBOR_TRUST_THUMBPRINT; \
     if (Test-Path -LiteralPath $p) { Remove-Item -LiteralPath $p; exit 0 } else { exit 3 }";

pub struct WindowsCertStoreAdapter<'r> {
    runner: &'r dyn CommandRunner,
    shell: String,
    store: String,
}

impl<'r> WindowsCertStoreAdapter<'r> {
    /// Resolve a scripting shell, `pwsh` before `powershell`.
    pub fn new(runner: &'r dyn CommandRunner, store: impl Into<String>) -> Result<Self> {
        let shell = SHELL_CANDIDATES
            .iter()
            .find(|candidate| runner.tool_exists(candidate))
            .ok_or_else(|| {
                PkiError::ToolMissing("neither pwsh nor powershell is on PATH".to_string())
            })?;
        Ok(Self {
            runner,
            shell: shell.to_string(),
            store: store.into(),
        })
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    fn location(&self) -> TrustLocation {
        TrustLocation::new(self.store.clone(), "certificate store")
    }

    fn script(&self, script: &str) -> CommandSpec {
        CommandSpec::new(&self.shell)
            .args(["-NoProfile", "-NonInteractive", "-Command", script])
            .env(ENV_STORE, &self.store)
    }

    /// Exit 0 means yes, [`EXIT_ABSENT`] means no, anything else is a failure.
    fn yes_no(&self, output: CommandOutput) -> Result<bool> {
        match output.code {
            Some(0) => Ok(true),
            Some(EXIT_ABSENT) => Ok(false),
            _ => Err(PkiError::invocation(
                self.shell.clone(),
                output.failure_summary(),
            )),
        }
    }
}

impl TrustStoreAdapter for WindowsCertStoreAdapter<'_> {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Windows
    }

    fn locations(&self) -> Vec<TrustLocation> {
        vec![self.location()]
    }

    fn primary_location(&self) -> TrustLocation {
        self.location()
    }

    fn is_present(&self, _location: &TrustLocation, fingerprint: &Fingerprint) -> Result<bool> {
        let spec = self
            .script(QUERY_SCRIPT)
            .env(ENV_THUMBPRINT, fingerprint.as_str());
        let output = self.runner.run(&spec)?;
        self.yes_no(output)
    }

    fn install(&self, cert_path: &Path) -> Result<TrustLocation> {
        let fingerprint = fingerprint_file(cert_path)?;
        let location = self.location();
        if self.is_present(&location, &fingerprint)? {
            return Ok(location);
        }

        let spec = self
            .script(INSTALL_SCRIPT)
            .env(ENV_CERT, cert_path.display().to_string());
        self.runner.run_checked(&spec)?;
        tracing::info!(store = %self.store, fingerprint = %fingerprint, "Imported root CA");
        Ok(location)
    }

    fn remove_from(&self, _location: &TrustLocation, fingerprint: &Fingerprint) -> Result<bool> {
        let spec = self
            .script(REMOVE_SCRIPT)
            .env(ENV_THUMBPRINT, fingerprint.as_str());
        let output = self.runner.run(&spec)?;
        let removed = self.yes_no(output)?;
        if removed {
            tracing::info!(store = %self.store, fingerprint = %fingerprint, "Removed root CA");
        }
        Ok(removed)
    }
}
