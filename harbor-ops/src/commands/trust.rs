use clap::Subcommand;
use harbor_pki::inspect::fingerprint_file;
use harbor_pki::trust::{
    InstallOutcome, SystemRunner, TrustSynchronizer, adapter_for, current_platform,
};
use harbor_pki::TrustConfig;

use crate::cli::TrustArgs;
use crate::output;

#[derive(Subcommand)]
pub enum TrustCommands {
    /// Add the root CA to the OS trust store
    Install(TrustArgs),

    /// Remove the root CA from every known trust location
    #[command(visible_alias = "rm")]
    Remove(TrustArgs),

    /// Report whether the root CA is trusted
    Status {
        #[command(flatten)]
        args: TrustArgs,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(cmd: TrustCommands) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        TrustCommands::Install(args) => with_synchronizer(&args.trust_config(), install),
        TrustCommands::Remove(args) => with_synchronizer(&args.trust_config(), remove),
        TrustCommands::Status { args, json } => {
            with_synchronizer(&args.trust_config(), |sync| status(sync, json))
        }
    }
}

/// Validate inputs and check the certificate before touching any platform tool.
fn with_synchronizer(
    config: &TrustConfig,
    action: impl FnOnce(&TrustSynchronizer<'_>) -> Result<(), Box<dyn std::error::Error>>,
) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    fingerprint_file(&config.cert_file)?;

    let runner = SystemRunner;
    let kind = current_platform(&runner)?;
    let adapter = adapter_for(kind, &runner, config)?;
    let sync = TrustSynchronizer::new(adapter.as_ref(), &config.cert_file);
    action(&sync)
}

fn install(sync: &TrustSynchronizer<'_>) -> Result<(), Box<dyn std::error::Error>> {
    match sync.install()? {
        InstallOutcome::AlreadyInstalled(location) => {
            output::step(&format!("Root CA already installed in {location}"));
        }
        InstallOutcome::Installed(location) => {
            output::success(&format!("Installed root CA in {location}"));
        }
    }
    Ok(())
}

fn remove(sync: &TrustSynchronizer<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let report = sync.remove()?;
    for location in &report.removed {
        output::success(&format!("Removed root CA from {location}"));
    }
    if report.not_found() {
        output::step("Root CA not found in any trust location");
    }

    let mut failures = report.failures.into_iter();
    let Some((location, first)) = failures.next() else {
        return Ok(());
    };
    output::warning(&format!("Could not remove from {location}: {first}"));
    for (location, err) in failures {
        output::warning(&format!("Could not remove from {location}: {err}"));
    }
    Err(first.into())
}

fn status(sync: &TrustSynchronizer<'_>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let status = sync.status()?;
    if json {
        output::json(&status)?;
        return Ok(());
    }

    output::section(&status.platform);
    output::field("Certificate", sync.cert_file().display());
    output::field("SHA-1", status.fingerprint.colon_separated());
    for line in &status.details {
        output::muted(&format!("  {line}"));
    }
    if status.installed {
        output::success("Root CA is trusted");
    } else {
        output::warning("Root CA is not trusted");
    }
    Ok(())
}
