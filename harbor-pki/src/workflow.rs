//! Caller-level policy on top of [`CertificateAuthority`].
//!
//! `ensure` fills gaps for first-time bring-up; `renew` always reissues the
//! server certificate. Both create the root first if it is absent and never
//! rotate an existing root.

use crate::authority::{CertificateAuthority, IssuedServerCert, RootOutcome, ServerRequest};
use crate::engine::CryptoEngine;
use crate::error::{PkiError, Result};

/// Hostnames the registry must never be published under.
const LOOPBACK_HOSTNAMES: [&str; 3] = ["localhost", "127.0.0.1", "::1"];

#[derive(Debug, Clone)]
pub enum LeafOutcome {
    Kept,
    Issued(IssuedServerCert),
}

#[derive(Debug, Clone)]
pub struct WorkflowReport {
    pub root: RootOutcome,
    pub leaf: LeafOutcome,
}

/// Reject loopback hostnames: external clients could never reach them.
pub fn check_hostname_policy(hostname: &str) -> Result<()> {
    let normalized = hostname.trim().to_ascii_lowercase();
    if LOOPBACK_HOSTNAMES.contains(&normalized.as_str()) {
        return Err(PkiError::Validation(format!(
            "hostname '{}' is a loopback name; use an address or DNS name clients can reach",
            hostname.trim()
        )));
    }
    Ok(())
}

fn prepare(hostname: &str, alt_names: Option<&str>, days: u32) -> Result<ServerRequest> {
    check_hostname_policy(hostname)?;
    ServerRequest::new(hostname, alt_names, days)
}

pub fn ensure<E: CryptoEngine>(
    ca: &CertificateAuthority<E>,
    hostname: &str,
    alt_names: Option<&str>,
    days: u32,
) -> Result<WorkflowReport> {
    let request = prepare(hostname, alt_names, days)?;
    let root = ca.ensure_root()?;

    if ca.store().leaf_exists() {
        tracing::info!(
            cert_path = %ca.store().server_cert().display(),
            "Server certificate already present; leaving it untouched"
        );
        return Ok(WorkflowReport {
            root,
            leaf: LeafOutcome::Kept,
        });
    }

    let issued = ca.issue_server_certificate(&request)?;
    Ok(WorkflowReport {
        root,
        leaf: LeafOutcome::Issued(issued),
    })
}

pub fn renew<E: CryptoEngine>(
    ca: &CertificateAuthority<E>,
    hostname: &str,
    alt_names: Option<&str>,
    days: u32,
) -> Result<WorkflowReport> {
    let request = prepare(hostname, alt_names, days)?;
    let root = ca.ensure_root()?;
    let issued = ca.issue_server_certificate(&request)?;
    Ok(WorkflowReport {
        root,
        leaf: LeafOutcome::Issued(issued),
    })
}
