use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the CA and trust subsystems.
///
/// Every variant is fatal to the current invocation. Callers distinguish
/// causes through [`PkiError::tag`], since the CLI exit code is always 1.
#[derive(Debug, Error)]
pub enum PkiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Required tool not available: {0}")]
    ToolMissing(String),

    #[error("Failed to read file {0}: {1}")]
    FileRead(PathBuf, std::io::Error),

    #[error("Failed to write file {0}: {1}")]
    FileWrite(PathBuf, std::io::Error),

    #[error("Elevated privileges required: {0}")]
    PrivilegeRequired(String),

    #[error("No supported trust store on this platform: {0}")]
    PlatformUnsupported(String),

    #[error("Certificate file not found: {0}")]
    CertFileMissing(PathBuf),

    #[error("`{tool}` failed: {detail}")]
    ToolInvocationFailed { tool: String, detail: String },

    #[error("Crypto operation failed: {0}")]
    Crypto(String),

    #[error("Failed to parse certificate material: {0}")]
    Parse(String),
}

impl PkiError {
    /// Stable tag printed next to the message on stderr.
    pub fn tag(&self) -> &'static str {
        match self {
            PkiError::Validation(_) => "validation",
            PkiError::ToolMissing(_) => "tool-missing",
            PkiError::FileRead(..) | PkiError::FileWrite(..) => "io",
            PkiError::PrivilegeRequired(_) => "privilege-required",
            PkiError::PlatformUnsupported(_) => "platform-unsupported",
            PkiError::CertFileMissing(_) => "cert-file-missing",
            PkiError::ToolInvocationFailed { .. } => "tool-invocation-failed",
            PkiError::Crypto(_) => "crypto",
            PkiError::Parse(_) => "parse",
        }
    }

    pub(crate) fn invocation(tool: impl Into<String>, detail: impl Into<String>) -> Self {
        PkiError::ToolInvocationFailed {
            tool: tool.into(),
            detail: detail.into(),
        }
    }
}

impl From<openssl::error::ErrorStack> for PkiError {
    fn from(err: openssl::error::ErrorStack) -> Self {
        PkiError::Crypto(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PkiError>;
