//! Read-only certificate inspection: PEM chains, summaries, fingerprints.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

use openssl::hash::{MessageDigest, hash};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use x509_parser::extensions::GeneralName;
use x509_parser::pem::Pem;

use crate::error::{PkiError, Result};

/// SHA-1 digest of a certificate's DER encoding, uppercase hex without separators.
///
/// This is the form Windows calls a thumbprint and macOS prints as `SHA-1 hash`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of_der(der: &[u8]) -> Result<Self> {
        let digest = hash(MessageDigest::sha1(), der)?;
        Ok(Self(hex::encode_upper(&digest[..])))
    }

    /// Accepts colon- or space-separated and lowercase renderings.
    pub fn parse(value: &str) -> Result<Self> {
        let normalized: String = value
            .chars()
            .filter(|c| !matches!(c, ':' | ' '))
            .collect::<String>()
            .to_ascii_uppercase();
        if normalized.len() != 40 || !normalized.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(PkiError::Parse(format!("'{value}' is not a SHA-1 fingerprint")));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn colon_separated(&self) -> String {
        self.0
            .as_bytes()
            .chunks(2)
            .map(|pair| String::from_utf8_lossy(pair).into_owned())
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CertSummary {
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub not_before: String,
    pub not_after: String,
    pub days_until_expiry: i64,
    pub fingerprint_sha1: Fingerprint,
    pub subject_alt_names: Vec<String>,
    pub is_ca: bool,
}

/// DER blocks of every `CERTIFICATE` entry in a PEM buffer, in file order.
pub fn pem_certificates(data: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut out = Vec::new();
    for pem in Pem::iter_from_buffer(data) {
        let pem = pem.map_err(|e| PkiError::Parse(format!("invalid PEM: {e}")))?;
        if pem.label == "CERTIFICATE" {
            out.push(pem.contents);
        }
    }
    Ok(out)
}

pub fn read_certificates(path: &Path) -> Result<Vec<Vec<u8>>> {
    let data = std::fs::read(path).map_err(|e| PkiError::FileRead(path.to_path_buf(), e))?;
    let certs = pem_certificates(&data)?;
    if certs.is_empty() {
        return Err(PkiError::Parse(format!(
            "{} contains no PEM certificate",
            path.display()
        )));
    }
    Ok(certs)
}

/// First certificate in the file.
pub fn read_certificate(path: &Path) -> Result<Vec<u8>> {
    let mut certs = read_certificates(path)?;
    Ok(certs.swap_remove(0))
}

pub fn fingerprint_file(path: &Path) -> Result<Fingerprint> {
    if !path.is_file() {
        return Err(PkiError::CertFileMissing(path.to_path_buf()));
    }
    Fingerprint::of_der(&read_certificate(path)?)
}

pub fn summarize_file(path: &Path) -> Result<CertSummary> {
    summarize_der(&read_certificate(path)?)
}

pub fn summarize_der(der: &[u8]) -> Result<CertSummary> {
    let (_, cert) = x509_parser::parse_x509_certificate(der)
        .map_err(|e| PkiError::Parse(format!("invalid X.509 certificate: {e}")))?;

    let validity = cert.validity();
    let not_after = validity.not_after.to_datetime();
    let days_until_expiry = (not_after - OffsetDateTime::now_utc()).whole_days();

    let mut subject_alt_names = Vec::new();
    if let Ok(Some(san)) = cert.subject_alternative_name() {
        for name in &san.value.general_names {
            match name {
                GeneralName::DNSName(dns) => subject_alt_names.push(format!("DNS:{dns}")),
                GeneralName::IPAddress(raw) => {
                    if let Some(addr) = ip_from_octets(raw) {
                        subject_alt_names.push(format!("IP:{addr}"));
                    }
                }
                _ => {}
            }
        }
    }

    let is_ca = matches!(cert.basic_constraints(), Ok(Some(bc)) if bc.value.ca);

    Ok(CertSummary {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        serial: serial_hex(cert.tbs_certificate.raw_serial()),
        not_before: format_time(validity.not_before.to_datetime()),
        not_after: format_time(not_after),
        days_until_expiry,
        fingerprint_sha1: Fingerprint::of_der(der)?,
        subject_alt_names,
        is_ca,
    })
}

/// Uppercase hex of the serial's value, without DER padding or sign bytes.
pub fn serial_hex(raw: &[u8]) -> String {
    let hex = hex::encode_upper(raw);
    let trimmed = hex.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn format_time(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.to_string())
}

fn ip_from_octets(raw: &[u8]) -> Option<IpAddr> {
    match raw.len() {
        4 => {
            let octets: [u8; 4] = raw.try_into().ok()?;
            Some(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = raw.try_into().ok()?;
            Some(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => None,
    }
}
