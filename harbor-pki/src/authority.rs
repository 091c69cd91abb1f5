//! Root CA lifecycle and server certificate issuance.
//!
//! The root is created once per certificate directory and reused until
//! someone deletes it by hand. Server certificates are replaced wholesale on
//! every issuance; whether to issue is the caller's decision (see
//! [`crate::workflow`]).

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::CaConfig;
use crate::engine::{CryptoEngine, OpensslEngine, SigningInput, Subject};
use crate::error::{PkiError, Result};
use crate::inspect::{CertSummary, summarize_file};
use crate::layout::KeyMaterialStore;
use crate::san::SanList;

/// Root CA common name
pub const CA_COMMON_NAME: &str = "Harbor Ops Local Root CA";

/// Organization used for root and leaf subjects
pub const CA_ORGANIZATION: &str = "Harbor Ops";

const KEY_FILE_MODE: u32 = 0o600;
const CERT_FILE_MODE: u32 = 0o644;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootOutcome {
    Created,
    Reused,
}

/// Validated input for one server certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRequest {
    pub hostname: String,
    pub sans: SanList,
    pub days: u32,
}

impl ServerRequest {
    pub fn new(hostname: &str, alt_names: Option<&str>, days: u32) -> Result<Self> {
        crate::config::validate_days("cert-days", days)?;
        let sans = SanList::build(hostname, alt_names)?;
        Ok(Self {
            hostname: hostname.trim().to_string(),
            sans,
            days,
        })
    }
}

#[derive(Debug, Clone)]
pub struct IssuedServerCert {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub fullchain_path: PathBuf,
    /// Uppercase hex
    pub serial: String,
    pub sans: SanList,
}

/// State of one certificate slot on disk.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SlotStatus {
    Missing { path: PathBuf },
    Present { path: PathBuf, certificate: CertSummary },
    Unreadable { path: PathBuf, reason: String },
}

impl SlotStatus {
    pub fn is_present(&self) -> bool {
        matches!(self, SlotStatus::Present { .. })
    }

    fn inspect(path: PathBuf) -> Self {
        if !path.is_file() {
            tracing::info!(path = %path.display(), "Certificate not present");
            return SlotStatus::Missing { path };
        }
        match summarize_file(&path) {
            Ok(certificate) => SlotStatus::Present { path, certificate },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Certificate unreadable");
                SlotStatus::Unreadable {
                    path,
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorityStatus {
    pub cert_dir: PathBuf,
    pub root: SlotStatus,
    pub server: SlotStatus,
    pub fullchain_present: bool,
}

pub struct CertificateAuthority<E: CryptoEngine = OpensslEngine> {
    store: KeyMaterialStore,
    engine: E,
    ca_days: u32,
    key_bits: u32,
}

impl CertificateAuthority<OpensslEngine> {
    pub fn from_config(config: &CaConfig) -> Self {
        Self::with_engine(config, OpensslEngine::new())
    }
}

impl<E: CryptoEngine> CertificateAuthority<E> {
    pub fn with_engine(config: &CaConfig, engine: E) -> Self {
        Self {
            store: config.store(),
            engine,
            ca_days: config.ca_days,
            key_bits: config.key_bits,
        }
    }

    pub fn store(&self) -> &KeyMaterialStore {
        &self.store
    }

    /// Create the root key and certificate unless both already exist.
    pub fn ensure_root(&self) -> Result<RootOutcome> {
        if self.store.root_exists() {
            tracing::debug!(dir = %self.store.dir().display(), "Reusing existing root CA");
            return Ok(RootOutcome::Reused);
        }

        self.engine.probe()?;
        create_dir(self.store.dir())?;

        let key_pem = self.engine.generate_key(self.key_bits)?;
        let serial = random_serial()?;
        let cert_pem = self.engine.self_sign_root(
            &key_pem,
            &Subject::new(CA_COMMON_NAME, CA_ORGANIZATION),
            serial,
            self.ca_days,
        )?;

        write_file(&self.store.ca_key(), &key_pem, KEY_FILE_MODE)?;
        write_file(&self.store.ca_cert(), &cert_pem, CERT_FILE_MODE)?;

        tracing::info!(
            cert_path = %self.store.ca_cert().display(),
            key_path = %self.store.ca_key().display(),
            days = self.ca_days,
            bits = self.key_bits,
            "Generated root CA"
        );
        Ok(RootOutcome::Created)
    }

    /// Issue a fresh leaf key and certificate, overwriting any existing ones.
    pub fn issue_server_certificate(&self, request: &ServerRequest) -> Result<IssuedServerCert> {
        let ca_cert_path = self.store.ca_cert();
        let ca_key_path = self.store.ca_key();
        if !self.store.root_exists() {
            return Err(PkiError::CertFileMissing(ca_cert_path));
        }
        let ca_cert_pem = read_file(&ca_cert_path)?;
        let ca_key_pem = read_file(&ca_key_path)?;

        self.engine.probe()?;

        let subject = Subject::new(&request.hostname, CA_ORGANIZATION);
        let leaf_key_pem = self.engine.generate_key(self.key_bits)?;
        let csr_pem = self
            .engine
            .build_server_csr(&leaf_key_pem, &subject, &request.sans)?;

        let serial = self.next_serial()?;
        let leaf_pem = self.engine.sign_server_csr(&SigningInput {
            csr_pem: &csr_pem,
            ca_cert_pem: &ca_cert_pem,
            ca_key_pem: &ca_key_pem,
            serial,
            days: request.days,
        })?;

        let issued = IssuedServerCert {
            cert_path: self.store.server_cert(),
            key_path: self.store.server_key(),
            fullchain_path: self.store.fullchain(),
            serial: format!("{serial:X}"),
            sans: request.sans.clone(),
        };

        write_file(&issued.key_path, &leaf_key_pem, KEY_FILE_MODE)?;
        write_file(&issued.cert_path, &leaf_pem, CERT_FILE_MODE)?;
        write_file(
            &issued.fullchain_path,
            &fullchain(&leaf_pem, &ca_cert_pem),
            CERT_FILE_MODE,
        )?;

        tracing::info!(
            hostname = %request.hostname,
            sans = %request.sans,
            serial = %issued.serial,
            days = request.days,
            cert_path = %issued.cert_path.display(),
            "Issued server certificate"
        );
        Ok(issued)
    }

    /// Subject/issuer/expiry of each slot. Never fails on missing files.
    pub fn status(&self) -> AuthorityStatus {
        AuthorityStatus {
            cert_dir: self.store.dir().to_path_buf(),
            root: SlotStatus::inspect(self.store.ca_cert()),
            server: SlotStatus::inspect(self.store.server_cert()),
            fullchain_present: self.store.fullchain().is_file(),
        }
    }

    /// Read, increment, and persist the serial counter.
    fn next_serial(&self) -> Result<u128> {
        let path = self.store.ca_serial();
        let current = if path.is_file() {
            let raw = read_file(&path)?;
            u128::from_str_radix(raw.trim(), 16).map_err(|e| {
                PkiError::Parse(format!("invalid serial in {}: {e}", path.display()))
            })?
        } else {
            random_serial()?
        };
        let next = current
            .checked_add(1)
            .ok_or_else(|| PkiError::Crypto("serial counter exhausted".to_string()))?;
        write_file(&path, &format!("{next:X}\n"), CERT_FILE_MODE)?;
        Ok(next)
    }
}

/// Leaf first, then root.
fn fullchain(leaf_pem: &str, ca_pem: &str) -> String {
    let mut chain = String::with_capacity(leaf_pem.len() + ca_pem.len() + 1);
    chain.push_str(leaf_pem);
    if !leaf_pem.ends_with('\n') {
        chain.push('\n');
    }
    chain.push_str(ca_pem);
    chain
}

/// Positive 63-bit start value, like `openssl x509 -CAcreateserial`.
fn random_serial() -> Result<u128> {
    let mut bytes = [0u8; 8];
    openssl::rand::rand_bytes(&mut bytes)?;
    Ok(u128::from(u64::from_be_bytes(bytes) >> 1).max(1))
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| PkiError::FileWrite(dir.to_path_buf(), e))
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| PkiError::FileRead(path.to_path_buf(), e))
}

fn write_file(path: &Path, contents: &str, mode: u32) -> Result<()> {
    fs::write(path, contents).map_err(|e| PkiError::FileWrite(path.to_path_buf(), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| PkiError::FileWrite(path.to_path_buf(), e))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::{read_certificates, summarize_der};
    use std::cell::Cell;
    use tempfile::TempDir;

    fn test_config(dir: &Path) -> CaConfig {
        CaConfig {
            key_bits: 2048,
            ..CaConfig::new(dir)
        }
    }

    fn request() -> ServerRequest {
        ServerRequest::new("10.0.0.16", Some("DNS:localhost,IP:127.0.0.1"), 30).unwrap()
    }

    /// Counts key generations and can pretend the engine is unavailable.
    struct CountingEngine {
        inner: OpensslEngine,
        keys: Cell<u32>,
        available: bool,
    }

    impl CountingEngine {
        fn new(available: bool) -> Self {
            Self {
                inner: OpensslEngine::new(),
                keys: Cell::new(0),
                available,
            }
        }
    }

    impl CryptoEngine for CountingEngine {
        fn probe(&self) -> Result<()> {
            if self.available {
                Ok(())
            } else {
                Err(PkiError::ToolMissing("test engine disabled".to_string()))
            }
        }

        fn generate_key(&self, bits: u32) -> Result<String> {
            self.keys.set(self.keys.get() + 1);
            self.inner.generate_key(bits)
        }

        fn self_sign_root(
            &self,
            key_pem: &str,
            subject: &Subject,
            serial: u128,
            days: u32,
        ) -> Result<String> {
            self.inner.self_sign_root(key_pem, subject, serial, days)
        }

        fn build_server_csr(
            &self,
            key_pem: &str,
            subject: &Subject,
            sans: &SanList,
        ) -> Result<String> {
            self.inner.build_server_csr(key_pem, subject, sans)
        }

        fn sign_server_csr(&self, input: &SigningInput<'_>) -> Result<String> {
            self.inner.sign_server_csr(input)
        }
    }

    #[test]
    fn ensure_root_creates_then_reuses() {
        let temp = TempDir::new().unwrap();
        let ca = CertificateAuthority::with_engine(
            &test_config(&temp.path().join("certs")),
            CountingEngine::new(true),
        );

        assert_eq!(ca.ensure_root().unwrap(), RootOutcome::Created);
        let cert_before = fs::read(ca.store().ca_cert()).unwrap();
        let key_before = fs::read(ca.store().ca_key()).unwrap();

        assert_eq!(ca.ensure_root().unwrap(), RootOutcome::Reused);
        assert_eq!(fs::read(ca.store().ca_cert()).unwrap(), cert_before);
        assert_eq!(fs::read(ca.store().ca_key()).unwrap(), key_before);
        assert_eq!(ca.engine.keys.get(), 1);
    }

    #[test]
    fn ensure_root_regenerates_when_key_is_missing() {
        let temp = TempDir::new().unwrap();
        let ca = CertificateAuthority::with_engine(
            &test_config(temp.path()),
            CountingEngine::new(true),
        );
        ca.ensure_root().unwrap();
        fs::remove_file(ca.store().ca_key()).unwrap();

        assert_eq!(ca.ensure_root().unwrap(), RootOutcome::Created);
        assert!(ca.store().root_exists());
    }

    #[test]
    fn missing_engine_is_reported_before_writing() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("certs");
        let ca = CertificateAuthority::with_engine(&test_config(&dir), CountingEngine::new(false));

        let err = ca.ensure_root().unwrap_err();
        assert!(matches!(err, PkiError::ToolMissing(_)));
        assert!(!dir.exists());
    }

    #[test]
    fn uncreatable_directory_is_an_io_error() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let ca = CertificateAuthority::with_engine(
            &test_config(&blocker.join("certs")),
            CountingEngine::new(true),
        );
        let err = ca.ensure_root().unwrap_err();
        assert_eq!(err.tag(), "io");
    }

    #[test]
    fn issue_requires_root() {
        let temp = TempDir::new().unwrap();
        let ca = CertificateAuthority::with_engine(
            &test_config(temp.path()),
            CountingEngine::new(true),
        );
        let err = ca.issue_server_certificate(&request()).unwrap_err();
        assert!(matches!(err, PkiError::CertFileMissing(_)));
    }

    #[test]
    fn issued_leaf_has_ordered_sans_and_root_issuer() {
        let temp = TempDir::new().unwrap();
        let ca = CertificateAuthority::with_engine(
            &test_config(temp.path()),
            CountingEngine::new(true),
        );
        ca.ensure_root().unwrap();
        let issued = ca.issue_server_certificate(&request()).unwrap();

        let leaf = summarize_file(&issued.cert_path).unwrap();
        assert_eq!(
            leaf.subject_alt_names,
            vec!["IP:10.0.0.16", "DNS:localhost", "IP:127.0.0.1"]
        );
        assert!(leaf.issuer.contains(CA_COMMON_NAME));
        assert!(leaf.subject.contains("CN=10.0.0.16"));
        assert!(!leaf.is_ca);
        assert_eq!(leaf.serial, issued.serial);
    }

    #[test]
    fn fullchain_is_leaf_then_root() {
        let temp = TempDir::new().unwrap();
        let ca = CertificateAuthority::with_engine(
            &test_config(temp.path()),
            CountingEngine::new(true),
        );
        ca.ensure_root().unwrap();
        let issued = ca.issue_server_certificate(&request()).unwrap();

        let chain = read_certificates(&issued.fullchain_path).unwrap();
        assert_eq!(chain.len(), 2);
        let leaf = read_certificates(&issued.cert_path).unwrap().remove(0);
        let root = read_certificates(&ca.store().ca_cert()).unwrap().remove(0);
        assert_eq!(chain[0], leaf);
        assert_eq!(chain[1], root);
        assert!(!summarize_der(&chain[0]).unwrap().is_ca);
        assert!(summarize_der(&chain[1]).unwrap().is_ca);
    }

    #[test]
    fn reissue_increments_serial_and_replaces_key() {
        let temp = TempDir::new().unwrap();
        let ca = CertificateAuthority::with_engine(
            &test_config(temp.path()),
            CountingEngine::new(true),
        );
        ca.ensure_root().unwrap();

        let first = ca.issue_server_certificate(&request()).unwrap();
        let first_key = fs::read(&first.key_path).unwrap();
        let second = ca.issue_server_certificate(&request()).unwrap();

        let a = u128::from_str_radix(&first.serial, 16).unwrap();
        let b = u128::from_str_radix(&second.serial, 16).unwrap();
        assert_eq!(b, a + 1);
        assert_ne!(fs::read(&second.key_path).unwrap(), first_key);

        let stored = fs::read_to_string(ca.store().ca_serial()).unwrap();
        assert_eq!(stored.trim(), second.serial);
    }

    #[test]
    fn serial_reads_the_same_everywhere_for_odd_and_high_bit_values() {
        let temp = TempDir::new().unwrap();
        let ca = CertificateAuthority::with_engine(
            &test_config(temp.path()),
            CountingEngine::new(true),
        );
        ca.ensure_root().unwrap();

        for (seed, expected) in [
            ("123456789ABCD", "123456789ABCE"),
            ("FFFFFFFFFFFFFE", "FFFFFFFFFFFFFF"),
        ] {
            fs::write(ca.store().ca_serial(), format!("{seed}\n")).unwrap();
            let issued = ca.issue_server_certificate(&request()).unwrap();
            assert_eq!(issued.serial, expected);

            let leaf = summarize_file(&issued.cert_path).unwrap();
            assert_eq!(leaf.serial, expected);
            let stored = fs::read_to_string(ca.store().ca_serial()).unwrap();
            assert_eq!(stored.trim(), expected);
        }
    }

    #[test]
    fn corrupt_serial_file_is_a_parse_error() {
        let temp = TempDir::new().unwrap();
        let ca = CertificateAuthority::with_engine(
            &test_config(temp.path()),
            CountingEngine::new(true),
        );
        ca.ensure_root().unwrap();
        fs::write(ca.store().ca_serial(), "not-hex").unwrap();
        assert!(matches!(
            ca.issue_server_certificate(&request()).unwrap_err(),
            PkiError::Parse(_)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn private_keys_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let ca = CertificateAuthority::with_engine(
            &test_config(temp.path()),
            CountingEngine::new(true),
        );
        ca.ensure_root().unwrap();
        let issued = ca.issue_server_certificate(&request()).unwrap();

        for key in [ca.store().ca_key(), issued.key_path] {
            let mode = fs::metadata(&key).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600, "{}", key.display());
        }
        let mode = fs::metadata(&issued.cert_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn status_reports_missing_slots_without_failing() {
        let temp = TempDir::new().unwrap();
        let ca = CertificateAuthority::with_engine(
            &test_config(temp.path()),
            CountingEngine::new(true),
        );
        let status = ca.status();
        assert!(matches!(status.root, SlotStatus::Missing { .. }));
        assert!(matches!(status.server, SlotStatus::Missing { .. }));
        assert!(!status.fullchain_present);
    }

    #[test]
    fn status_reports_present_and_unreadable_slots() {
        let temp = TempDir::new().unwrap();
        let ca = CertificateAuthority::with_engine(
            &test_config(temp.path()),
            CountingEngine::new(true),
        );
        ca.ensure_root().unwrap();
        fs::write(ca.store().server_cert(), "garbage").unwrap();

        let status = ca.status();
        let SlotStatus::Present { certificate, .. } = &status.root else {
            panic!("expected root to be present");
        };
        assert!(certificate.subject.contains(CA_COMMON_NAME));
        assert!(matches!(status.server, SlotStatus::Unreadable { .. }));
    }

    #[test]
    fn fullchain_inserts_newline_between_blocks() {
        let chain = fullchain("LEAF", "ROOT\n");
        assert_eq!(chain, "LEAF\nROOT\n");
        assert_eq!(fullchain("LEAF\n", "ROOT\n"), "LEAF\nROOT\n");
    }

    #[test]
    fn request_rejects_zero_days_before_anything_else() {
        let err = ServerRequest::new("harbor.lan", None, 0).unwrap_err();
        assert!(matches!(err, PkiError::Validation(_)));
    }
}
