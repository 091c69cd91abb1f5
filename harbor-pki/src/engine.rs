//! Key and certificate generation port.
//!
//! [`CryptoEngine`] is the seam between CA policy and the cryptographic
//! primitives. Production wiring uses [`OpensslEngine`]; everything is kept as
//! PEM text so the CA only ever moves strings between the engine and disk.

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::stack::Stack;
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
    SubjectKeyIdentifier,
};
use openssl::x509::{
    X509, X509Builder, X509Name, X509NameBuilder, X509Ref, X509Req, X509ReqBuilder,
};

use crate::error::{PkiError, Result};
use crate::san::{SanList, SubjectAltName};

/// Subject fields used for both root and leaf certificates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub common_name: String,
    pub organization: String,
}

impl Subject {
    pub fn new(common_name: impl Into<String>, organization: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            organization: organization.into(),
        }
    }
}

/// Everything the root needs to sign a leaf.
pub struct SigningInput<'a> {
    pub csr_pem: &'a str,
    pub ca_cert_pem: &'a str,
    pub ca_key_pem: &'a str,
    pub serial: u128,
    pub days: u32,
}

pub trait CryptoEngine {
    /// Fails with [`PkiError::ToolMissing`] when the engine cannot operate.
    fn probe(&self) -> Result<()>;

    /// Fresh RSA private key as PKCS#8 PEM.
    fn generate_key(&self, bits: u32) -> Result<String>;

    /// Self-signed CA certificate for `key_pem`.
    fn self_sign_root(&self, key_pem: &str, subject: &Subject, serial: u128, days: u32)
    -> Result<String>;

    /// Certificate signing request carrying the server extensions and SANs.
    fn build_server_csr(&self, key_pem: &str, subject: &Subject, sans: &SanList) -> Result<String>;

    /// Sign a request with the root, copying its requested extensions.
    fn sign_server_csr(&self, input: &SigningInput<'_>) -> Result<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OpensslEngine;

impl OpensslEngine {
    pub fn new() -> Self {
        Self
    }
}

fn build_name(subject: &Subject) -> Result<X509Name> {
    let mut name = X509NameBuilder::new()?;
    name.append_entry_by_nid(Nid::COMMONNAME, &subject.common_name)?;
    name.append_entry_by_nid(Nid::ORGANIZATIONNAME, &subject.organization)?;
    Ok(name.build())
}

fn load_key(pem: &str) -> Result<PKey<Private>> {
    PKey::private_key_from_pem(pem.as_bytes())
        .map_err(|e| PkiError::Parse(format!("invalid private key: {e}")))
}

fn serial_number(serial: u128) -> Result<openssl::asn1::Asn1Integer> {
    let bn = BigNum::from_hex_str(&format!("{serial:X}"))?;
    Ok(bn.to_asn1_integer()?)
}

fn pem_string(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| PkiError::Crypto(format!("PEM output is not UTF-8: {e}")))
}

fn validity_builder(builder: &mut X509Builder, days: u32) -> Result<()> {
    let not_before = Asn1Time::days_from_now(0)?;
    let not_after = Asn1Time::days_from_now(days)?;
    builder.set_not_before(&not_before)?;
    builder.set_not_after(&not_after)?;
    Ok(())
}

impl CryptoEngine for OpensslEngine {
    fn probe(&self) -> Result<()> {
        openssl::init();
        if MessageDigest::from_name("SHA256").is_none() {
            return Err(PkiError::ToolMissing(format!(
                "linked {} does not provide SHA-256",
                openssl::version::version()
            )));
        }
        Ok(())
    }

    fn generate_key(&self, bits: u32) -> Result<String> {
        let rsa = Rsa::generate(bits)?;
        let key = PKey::from_rsa(rsa)?;
        pem_string(key.private_key_to_pem_pkcs8()?)
    }

    fn self_sign_root(
        &self,
        key_pem: &str,
        subject: &Subject,
        serial: u128,
        days: u32,
    ) -> Result<String> {
        let key = load_key(key_pem)?;
        let name = build_name(subject)?;

        let mut builder = X509Builder::new()?;
        builder.set_version(2)?;
        let serial = serial_number(serial)?;
        builder.set_serial_number(&serial)?;
        builder.set_subject_name(&name)?;
        builder.set_issuer_name(&name)?;
        builder.set_pubkey(&key)?;
        validity_builder(&mut builder, days)?;

        builder.append_extension(BasicConstraints::new().critical().ca().build()?)?;
        builder.append_extension(
            KeyUsage::new()
                .critical()
                .key_cert_sign()
                .crl_sign()
                .digital_signature()
                .build()?,
        )?;
        let ski = SubjectKeyIdentifier::new().build(&builder.x509v3_context(None, None))?;
        builder.append_extension(ski)?;

        builder.sign(&key, MessageDigest::sha256())?;
        pem_string(builder.build().to_pem()?)
    }

    fn build_server_csr(&self, key_pem: &str, subject: &Subject, sans: &SanList) -> Result<String> {
        let key = load_key(key_pem)?;
        let name = build_name(subject)?;

        let mut builder = X509ReqBuilder::new()?;
        builder.set_version(0)?;
        builder.set_subject_name(&name)?;
        builder.set_pubkey(&key)?;

        let mut extensions = Stack::new()?;
        extensions.push(BasicConstraints::new().build()?)?;
        extensions.push(
            KeyUsage::new()
                .digital_signature()
                .key_encipherment()
                .build()?,
        )?;
        extensions.push(ExtendedKeyUsage::new().server_auth().build()?)?;

        // Entries are encoded in insertion order.
        let mut san = SubjectAlternativeName::new();
        for entry in sans.entries() {
            match entry {
                SubjectAltName::Dns(name) => san.dns(name),
                SubjectAltName::Ip(addr) => san.ip(&addr.to_string()),
            };
        }
        extensions.push(san.build(&builder.x509v3_context(None))?)?;
        builder.add_extensions(&extensions)?;

        builder.sign(&key, MessageDigest::sha256())?;
        pem_string(builder.build().to_pem()?)
    }

    fn sign_server_csr(&self, input: &SigningInput<'_>) -> Result<String> {
        let req = X509Req::from_pem(input.csr_pem.as_bytes())
            .map_err(|e| PkiError::Parse(format!("invalid signing request: {e}")))?;
        let req_key = req.public_key()?;
        if !req.verify(&req_key)? {
            return Err(PkiError::Crypto(
                "signing request signature does not verify".to_string(),
            ));
        }

        let ca_cert = X509::from_pem(input.ca_cert_pem.as_bytes())
            .map_err(|e| PkiError::Parse(format!("invalid CA certificate: {e}")))?;
        let issuer: &X509Ref = &ca_cert;
        let ca_key = load_key(input.ca_key_pem)?;

        let mut builder = X509Builder::new()?;
        builder.set_version(2)?;
        let serial = serial_number(input.serial)?;
        builder.set_serial_number(&serial)?;
        builder.set_subject_name(req.subject_name())?;
        builder.set_issuer_name(issuer.subject_name())?;
        builder.set_pubkey(&req_key)?;
        validity_builder(&mut builder, input.days)?;

        for extension in req.extensions()? {
            builder.append_extension(extension)?;
        }
        let ski = SubjectKeyIdentifier::new().build(&builder.x509v3_context(Some(issuer), None))?;
        builder.append_extension(ski)?;
        let aki = AuthorityKeyIdentifier::new()
            .keyid(false)
            .issuer(false)
            .build(&builder.x509v3_context(Some(issuer), None))?;
        builder.append_extension(aki)?;

        builder.sign(&ca_key, MessageDigest::sha256())?;
        pem_string(builder.build().to_pem()?)
    }
}
