//! Explicit configuration passed to every component constructor.

use std::path::PathBuf;

use crate::error::{PkiError, Result};
use crate::layout::{CA_CERT_FILENAME, KeyMaterialStore};

pub const DEFAULT_CERT_DIR: &str = "./certs";
pub const DEFAULT_CA_DAYS: u32 = 3650;
pub const DEFAULT_CERT_DAYS: u32 = 365;
pub const DEFAULT_KEY_BITS: u32 = 4096;
pub const DEFAULT_WINDOWS_STORE: &str = r"Cert:\CurrentUser\Root";

/// Upper bound on any validity period (100 years).
pub const MAX_VALIDITY_DAYS: u32 = 36_500;

#[derive(Debug, Clone)]
pub struct CaConfig {
    pub cert_dir: PathBuf,
    pub ca_days: u32,
    pub cert_days: u32,
    /// RSA modulus size for both root and leaf keys.
    pub key_bits: u32,
}

impl Default for CaConfig {
    fn default() -> Self {
        Self {
            cert_dir: PathBuf::from(DEFAULT_CERT_DIR),
            ca_days: DEFAULT_CA_DAYS,
            cert_days: DEFAULT_CERT_DAYS,
            key_bits: DEFAULT_KEY_BITS,
        }
    }
}

impl CaConfig {
    pub fn new(cert_dir: impl Into<PathBuf>) -> Self {
        Self {
            cert_dir: cert_dir.into(),
            ..Self::default()
        }
    }

    pub fn store(&self) -> KeyMaterialStore {
        KeyMaterialStore::new(&self.cert_dir)
    }

    /// Reject bad numeric input before anything touches disk.
    pub fn validate(&self) -> Result<()> {
        validate_days("ca-days", self.ca_days)?;
        validate_days("cert-days", self.cert_days)?;
        if !(2048..=8192).contains(&self.key_bits) {
            return Err(PkiError::Validation(format!(
                "key size must be between 2048 and 8192 bits, got {}",
                self.key_bits
            )));
        }
        Ok(())
    }
}

pub fn validate_days(flag: &str, days: u32) -> Result<()> {
    if days == 0 || days > MAX_VALIDITY_DAYS {
        return Err(PkiError::Validation(format!(
            "--{flag} must be between 1 and {MAX_VALIDITY_DAYS}, got {days}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct TrustConfig {
    /// Root certificate to synchronize.
    pub cert_file: PathBuf,
    /// PowerShell certificate provider path.
    pub windows_store: String,
    /// Overrides the Linux anchor directory chosen from the detected tool.
    pub linux_anchor_dir: Option<PathBuf>,
}

impl TrustConfig {
    pub fn new(cert_file: impl Into<PathBuf>) -> Self {
        Self {
            cert_file: cert_file.into(),
            windows_store: DEFAULT_WINDOWS_STORE.to_string(),
            linux_anchor_dir: None,
        }
    }

    pub fn for_cert_dir(cert_dir: impl Into<PathBuf>) -> Self {
        Self::new(cert_dir.into().join(CA_CERT_FILENAME))
    }

    pub fn validate(&self) -> Result<()> {
        let store = self.windows_store.trim();
        if !store.starts_with("Cert:\\") {
            return Err(PkiError::Validation(format!(
                "windows store must be a certificate provider path like {DEFAULT_WINDOWS_STORE}, got '{}'",
                self.windows_store
            )));
        }
        Ok(())
    }
}
