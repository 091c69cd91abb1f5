//! Platform detection and adapter selection.

use super::linux::LinuxAnchorAdapter;
use super::macos::MacKeychainAdapter;
use super::runner::CommandRunner;
use super::windows::WindowsCertStoreAdapter;
use super::{LinuxTrustTool, PlatformKind, TrustStoreAdapter};
use crate::config::TrustConfig;
use crate::error::{PkiError, Result};

/// Map an OS name (as in [`std::env::consts::OS`]) and the tools on PATH to a
/// trust-store platform. Debian-style tooling wins when both are installed.
pub fn detect_platform(os: &str, runner: &dyn CommandRunner) -> Result<PlatformKind> {
    match os {
        "macos" => {
            if !runner.tool_exists("security") {
                return Err(PkiError::ToolMissing(
                    "`security` is required to manage keychains".to_string(),
                ));
            }
            Ok(PlatformKind::MacOs)
        }
        "linux" => {
            if runner.tool_exists("update-ca-certificates") {
                Ok(PlatformKind::Linux(LinuxTrustTool::Debian))
            } else if runner.tool_exists("update-ca-trust") {
                Ok(PlatformKind::Linux(LinuxTrustTool::Rhel))
            } else {
                Err(PkiError::PlatformUnsupported(
                    "neither update-ca-certificates nor update-ca-trust is installed".to_string(),
                ))
            }
        }
        "windows" => Ok(PlatformKind::Windows),
        other => Err(PkiError::PlatformUnsupported(format!(
            "no trust store integration for '{other}'"
        ))),
    }
}

pub fn current_platform(runner: &dyn CommandRunner) -> Result<PlatformKind> {
    let kind = detect_platform(std::env::consts::OS, runner)?;
    tracing::debug!(platform = %kind, "Detected trust store platform");
    Ok(kind)
}

pub fn adapter_for<'r>(
    kind: PlatformKind,
    runner: &'r dyn CommandRunner,
    config: &TrustConfig,
) -> Result<Box<dyn TrustStoreAdapter + 'r>> {
    let adapter: Box<dyn TrustStoreAdapter + 'r> = match kind {
        PlatformKind::MacOs => Box::new(MacKeychainAdapter::new(runner)?),
        PlatformKind::Linux(tool) => match &config.linux_anchor_dir {
            Some(dir) => Box::new(LinuxAnchorAdapter::with_anchor_dir(runner, tool, dir.clone())),
            None => Box::new(LinuxAnchorAdapter::new(runner, tool)),
        },
        PlatformKind::Windows => Box::new(WindowsCertStoreAdapter::new(
            runner,
            config.windows_store.trim(),
        )?),
    };
    Ok(adapter)
}
