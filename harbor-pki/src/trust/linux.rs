//! Linux system anchor directories.
//!
//! The certificate is copied under a fixed name, made world-readable, and the
//! distribution's refresh tool rebuilds the bundle. Writing the anchor needs
//! root; when not already root the adapter goes through `sudo`.

use std::fs;
use std::path::{Path, PathBuf};

use super::runner::{CommandRunner, CommandSpec};
use super::{LinuxTrustTool, PlatformKind, TrustLocation, TrustStoreAdapter};
use crate::error::{PkiError, Result};
use crate::inspect::{Fingerprint, fingerprint_file};

pub const DEBIAN_ANCHOR_DIR: &str = "/usr/local/share/ca-certificates";
pub const RHEL_ANCHOR_DIR: &str = "/etc/pki/ca-trust/source/anchors";
/// Debian's tool only picks up `*.crt`.
pub const TRUSTED_CA_FILENAME: &str = "harbor-ops-ca.crt";

impl LinuxTrustTool {
    pub fn refresh_command(self) -> CommandSpec {
        match self {
            LinuxTrustTool::Debian => CommandSpec::new("update-ca-certificates"),
            LinuxTrustTool::Rhel => CommandSpec::new("update-ca-trust").arg("extract"),
        }
    }

    pub fn default_anchor_dir(self) -> &'static str {
        match self {
            LinuxTrustTool::Debian => DEBIAN_ANCHOR_DIR,
            LinuxTrustTool::Rhel => RHEL_ANCHOR_DIR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Privilege {
    Direct,
    Sudo,
}

pub struct LinuxAnchorAdapter<'r> {
    runner: &'r dyn CommandRunner,
    tool: LinuxTrustTool,
    anchor_dir: PathBuf,
}

impl<'r> LinuxAnchorAdapter<'r> {
    pub fn new(runner: &'r dyn CommandRunner, tool: LinuxTrustTool) -> Self {
        Self::with_anchor_dir(runner, tool, tool.default_anchor_dir())
    }

    pub fn with_anchor_dir(
        runner: &'r dyn CommandRunner,
        tool: LinuxTrustTool,
        anchor_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            tool,
            anchor_dir: anchor_dir.into(),
        }
    }

    pub fn anchor_path(&self) -> PathBuf {
        self.anchor_dir.join(TRUSTED_CA_FILENAME)
    }

    fn location(&self) -> TrustLocation {
        TrustLocation::new(self.anchor_path().display().to_string(), "system anchors")
    }

    /// Checked per call; elevation is never cached.
    fn privilege(&self) -> Result<Privilege> {
        if self.runner.is_elevated() {
            return Ok(Privilege::Direct);
        }
        if self.runner.tool_exists("sudo") {
            return Ok(Privilege::Sudo);
        }
        Err(PkiError::PrivilegeRequired(format!(
            "writing {} requires root and sudo is unavailable",
            self.anchor_dir.display()
        )))
    }

    fn refresh(&self, privilege: Privilege) -> Result<()> {
        let spec = match privilege {
            Privilege::Direct => self.tool.refresh_command(),
            Privilege::Sudo => self.tool.refresh_command().elevated(),
        };
        self.runner.run_checked(&spec)?;
        Ok(())
    }

    fn copy_anchor(&self, cert_path: &Path, privilege: Privilege) -> Result<()> {
        let dest = self.anchor_path();
        match privilege {
            Privilege::Direct => {
                fs::create_dir_all(&self.anchor_dir)
                    .map_err(|e| PkiError::FileWrite(self.anchor_dir.clone(), e))?;
                fs::copy(cert_path, &dest).map_err(|e| PkiError::FileWrite(dest.clone(), e))?;

                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    fs::set_permissions(&dest, fs::Permissions::from_mode(0o644))
                        .map_err(|e| PkiError::FileWrite(dest.clone(), e))?;
                }
            }
            Privilege::Sudo => {
                let spec = CommandSpec::new("install")
                    .args(["-D", "-m", "644"])
                    .arg(cert_path)
                    .arg(&dest)
                    .elevated();
                self.runner.run_checked(&spec)?;
            }
        }
        Ok(())
    }

    fn delete_anchor(&self, privilege: Privilege) -> Result<()> {
        let dest = self.anchor_path();
        match privilege {
            Privilege::Direct => {
                fs::remove_file(&dest).map_err(|e| PkiError::FileWrite(dest.clone(), e))
            }
            Privilege::Sudo => {
                let spec = CommandSpec::new("rm").arg("-f").arg(&dest).elevated();
                self.runner.run_checked(&spec).map(|_| ())
            }
        }
    }
}

impl TrustStoreAdapter for LinuxAnchorAdapter<'_> {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Linux(self.tool)
    }

    fn locations(&self) -> Vec<TrustLocation> {
        vec![self.location()]
    }

    fn primary_location(&self) -> TrustLocation {
        self.location()
    }

    /// Anchors are world-readable, so no elevation is needed to look.
    fn is_present(&self, _location: &TrustLocation, fingerprint: &Fingerprint) -> Result<bool> {
        let anchor = self.anchor_path();
        if !anchor.is_file() {
            return Ok(false);
        }
        Ok(fingerprint_file(&anchor)? == *fingerprint)
    }

    fn install(&self, cert_path: &Path) -> Result<TrustLocation> {
        if !cert_path.is_file() {
            return Err(PkiError::CertFileMissing(cert_path.to_path_buf()));
        }
        let privilege = self.privilege()?;
        self.copy_anchor(cert_path, privilege)?;
        self.refresh(privilege)?;

        let location = self.location();
        tracing::info!(anchor = %location.id, tool = ?self.tool, "Installed root CA anchor");
        Ok(location)
    }

    fn remove_from(&self, location: &TrustLocation, fingerprint: &Fingerprint) -> Result<bool> {
        // A different certificate under our file name is not ours to delete.
        if !self.is_present(location, fingerprint)? {
            return Ok(false);
        }
        let privilege = self.privilege()?;
        self.delete_anchor(privilege)?;
        self.refresh(privilege)?;
        tracing::info!(anchor = %location.id, fingerprint = %fingerprint, "Removed root CA anchor");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::testing::{FakeRunner, write_test_root};
    use tempfile::TempDir;

    #[test]
    fn refresh_commands_per_tool() {
        assert_eq!(
            LinuxTrustTool::Debian.refresh_command().display(),
            "update-ca-certificates"
        );
        assert_eq!(
            LinuxTrustTool::Rhel.refresh_command().display(),
            "update-ca-trust extract"
        );
    }

    #[test]
    fn default_anchor_paths() {
        let runner = FakeRunner::linux(true);
        let debian = LinuxAnchorAdapter::new(&runner, LinuxTrustTool::Debian);
        assert_eq!(
            debian.anchor_path(),
            PathBuf::from("/usr/local/share/ca-certificates/harbor-ops-ca.crt")
        );
        let rhel = LinuxAnchorAdapter::new(&runner, LinuxTrustTool::Rhel);
        assert_eq!(
            rhel.anchor_path(),
            PathBuf::from("/etc/pki/ca-trust/source/anchors/harbor-ops-ca.crt")
        );
    }

    #[cfg(unix)]
    #[test]
    fn install_as_root_copies_world_readable_and_refreshes() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let (cert, fp) = write_test_root(temp.path());
        let anchors = temp.path().join("anchors");
        let runner = FakeRunner::linux(true);
        let adapter =
            LinuxAnchorAdapter::with_anchor_dir(&runner, LinuxTrustTool::Debian, &anchors);

        adapter.install(&cert).unwrap();
        let mode = fs::metadata(adapter.anchor_path())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o644);
        assert!(adapter.query_installed(&fp).unwrap());
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].display(), "update-ca-certificates");
    }

    #[test]
    fn install_without_root_goes_through_sudo() {
        let temp = TempDir::new().unwrap();
        let (cert, fp) = write_test_root(temp.path());
        let anchors = temp.path().join("anchors");
        let runner = FakeRunner::linux(false);
        let adapter = LinuxAnchorAdapter::with_anchor_dir(&runner, LinuxTrustTool::Rhel, &anchors);

        adapter.install(&cert).unwrap();
        let calls = runner.calls();
        assert!(calls.iter().all(|c| c.program == "sudo"));
        assert_eq!(calls[0].args[0], "install");
        assert_eq!(calls[1].display(), "sudo update-ca-trust extract");
        assert!(adapter.query_installed(&fp).unwrap());
    }

    #[test]
    fn install_without_root_or_sudo_is_privilege_required() {
        let temp = TempDir::new().unwrap();
        let (cert, _) = write_test_root(temp.path());
        let runner = FakeRunner::linux(false).without_tool("sudo");
        let adapter = LinuxAnchorAdapter::with_anchor_dir(
            &runner,
            LinuxTrustTool::Debian,
            temp.path().join("anchors"),
        );

        let err = adapter.install(&cert).unwrap_err();
        assert!(matches!(err, PkiError::PrivilegeRequired(_)));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn foreign_anchor_under_our_name_is_left_alone() {
        let temp = TempDir::new().unwrap();
        let (_, ours_fp) = write_test_root(&temp.path().join("a"));
        let (theirs, _) = write_test_root(&temp.path().join("b"));
        let anchors = temp.path().join("anchors");
        let runner = FakeRunner::linux(true);
        let adapter =
            LinuxAnchorAdapter::with_anchor_dir(&runner, LinuxTrustTool::Debian, &anchors);

        adapter.install(&theirs).unwrap();
        assert!(!adapter.query_installed(&ours_fp).unwrap());
        let removed = adapter.remove_from(&adapter.primary_location(), &ours_fp).unwrap();
        assert!(!removed);
        assert!(adapter.anchor_path().exists());
    }

    #[test]
    fn refresh_failure_is_tool_invocation_failed() {
        let temp = TempDir::new().unwrap();
        let (cert, _) = write_test_root(temp.path());
        let runner = FakeRunner::linux(true).failing("update-ca-certificates");
        let adapter = LinuxAnchorAdapter::with_anchor_dir(
            &runner,
            LinuxTrustTool::Debian,
            temp.path().join("anchors"),
        );
        let err = adapter.install(&cert).unwrap_err();
        assert_eq!(err.tag(), "tool-invocation-failed");
    }
}
