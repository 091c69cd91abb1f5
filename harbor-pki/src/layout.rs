//! On-disk layout of the key material directory.

use std::path::{Path, PathBuf};

pub const CA_KEY_FILENAME: &str = "ca.key";
pub const CA_CERT_FILENAME: &str = "ca.crt";
pub const CA_SERIAL_FILENAME: &str = "ca.srl";
pub const SERVER_KEY_FILENAME: &str = "harbor.key";
pub const SERVER_CERT_FILENAME: &str = "harbor.crt";
pub const FULLCHAIN_FILENAME: &str = "harbor.fullchain.crt";

/// Fixed file names relative to a certificate directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterialStore {
    dir: PathBuf,
}

impl KeyMaterialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ca_key(&self) -> PathBuf {
        self.dir.join(CA_KEY_FILENAME)
    }

    pub fn ca_cert(&self) -> PathBuf {
        self.dir.join(CA_CERT_FILENAME)
    }

    /// Last serial handed out by the root, uppercase hex.
    pub fn ca_serial(&self) -> PathBuf {
        self.dir.join(CA_SERIAL_FILENAME)
    }

    pub fn server_key(&self) -> PathBuf {
        self.dir.join(SERVER_KEY_FILENAME)
    }

    pub fn server_cert(&self) -> PathBuf {
        self.dir.join(SERVER_CERT_FILENAME)
    }

    pub fn fullchain(&self) -> PathBuf {
        self.dir.join(FULLCHAIN_FILENAME)
    }

    /// Root key and cert are created together; one without the other counts as absent.
    pub fn root_exists(&self) -> bool {
        self.ca_key().is_file() && self.ca_cert().is_file()
    }

    pub fn leaf_exists(&self) -> bool {
        self.server_key().is_file() && self.server_cert().is_file()
    }
}
