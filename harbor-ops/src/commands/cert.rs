use std::path::Path;

use harbor_pki::authority::SlotStatus;
use harbor_pki::workflow::{self, LeafOutcome, WorkflowReport};
use harbor_pki::{CaConfig, CertificateAuthority, KeyMaterialStore, RootOutcome};

use crate::cli::IssueArgs;
use crate::output;

pub fn ensure(args: &IssueArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.ca_config();
    config.validate()?;
    let ca = CertificateAuthority::from_config(&config);

    let report = workflow::ensure(
        &ca,
        &args.hostname,
        args.alt_names.as_deref(),
        config.cert_days,
    )?;
    print_report(ca.store(), &report);
    Ok(())
}

pub fn renew(args: &IssueArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.ca_config();
    config.validate()?;
    let ca = CertificateAuthority::from_config(&config);

    let report = workflow::renew(
        &ca,
        &args.hostname,
        args.alt_names.as_deref(),
        config.cert_days,
    )?;
    print_report(ca.store(), &report);
    output::warning("Restart the registry runtime to serve the new certificate.");
    Ok(())
}

fn print_report(store: &KeyMaterialStore, report: &WorkflowReport) {
    match report.root {
        RootOutcome::Created => output::success(&format!(
            "Created root CA {}",
            store.ca_cert().display()
        )),
        RootOutcome::Reused => output::step(&format!(
            "Using existing root CA {}",
            store.ca_cert().display()
        )),
    }

    match &report.leaf {
        LeafOutcome::Kept => {
            output::step(&format!(
                "Server certificate {} already present",
                store.server_cert().display()
            ));
            output::muted("  Run `harbor-ops renew` to replace it.");
        }
        LeafOutcome::Issued(issued) => {
            output::success(&format!(
                "Issued server certificate {}",
                issued.cert_path.display()
            ));
            output::field("SANs", &issued.sans);
            output::field("Serial", &issued.serial);
        }
    }

    output::muted(&format!(
        "TLS certificate: {}  key: {}",
        store.fullchain().display(),
        store.server_key().display()
    ));
}

pub fn status(cert_dir: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = CaConfig::new(cert_dir);
    let store = config.store();
    let status = CertificateAuthority::from_config(&config).status();

    if json {
        output::json(&status)?;
        return Ok(());
    }

    output::section("Root CA");
    print_slot(&status.root);
    output::section("Server certificate");
    print_slot(&status.server);
    if status.server.is_present() && !status.fullchain_present {
        output::warning(&format!(
            "{} is missing; run `harbor-ops renew`",
            store.fullchain().display()
        ));
    }
    Ok(())
}

fn print_slot(slot: &SlotStatus) {
    match slot {
        SlotStatus::Missing { path } => {
            output::warning(&format!("missing ({})", path.display()));
        }
        SlotStatus::Unreadable { path, reason } => {
            output::warning(&format!("unreadable ({}): {reason}", path.display()));
        }
        SlotStatus::Present { path, certificate } => {
            output::field("Path", path.display());
            output::field("Subject", &certificate.subject);
            output::field("Issuer", &certificate.issuer);
            output::field("Serial", &certificate.serial);
            output::field("Not after", &certificate.not_after);
            let expiry = if certificate.days_until_expiry < 0 {
                output::brand_error(format!("expired {} days ago", -certificate.days_until_expiry))
                    .to_string()
            } else {
                format!("{} days", certificate.days_until_expiry)
            };
            output::field("Expires in", expiry);
            output::field("SHA-1", certificate.fingerprint_sha1.colon_separated());
            if !certificate.subject_alt_names.is_empty() {
                output::field("SANs", certificate.subject_alt_names.join(", "));
            }
        }
    }
}
