use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use harbor_pki::config::{
    DEFAULT_CA_DAYS, DEFAULT_CERT_DAYS, DEFAULT_CERT_DIR, DEFAULT_KEY_BITS, DEFAULT_WINDOWS_STORE,
};
use harbor_pki::{CaConfig, TrustConfig};

use crate::commands::{cert, trust};

/// Harbor Ops - TLS material and OS trust for a Harbor registry deployment
#[derive(Parser)]
#[command(name = "harbor-ops")]
#[command(version, disable_version_flag = true)]
#[command(about = "Harbor Ops - TLS material and OS trust for a Harbor registry deployment")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Show version
    #[arg(long, global = true)]
    pub version: bool,

    /// Show verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Args, Debug, Clone)]
pub struct CertDirArgs {
    /// Directory holding CA and server key material
    #[arg(long, env = "HARBOR_CERT_DIR", default_value = DEFAULT_CERT_DIR)]
    pub cert_dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct IssueArgs {
    /// Hostname clients use to reach the registry (IPv4 literals become IP SANs)
    #[arg(long, env = "HARBOR_HOSTNAME")]
    pub hostname: String,

    /// Extra SANs, comma-separated, each `DNS:<name>` or `IP:<addr>`
    #[arg(long, env = "HARBOR_ALT_NAMES")]
    pub alt_names: Option<String>,

    #[command(flatten)]
    pub dir: CertDirArgs,

    /// Server certificate validity in days
    #[arg(long, env = "HARBOR_CERT_DAYS", default_value_t = DEFAULT_CERT_DAYS)]
    pub cert_days: u32,

    /// Root CA validity in days (only used when the root is created)
    #[arg(long, env = "HARBOR_CA_DAYS", default_value_t = DEFAULT_CA_DAYS)]
    pub ca_days: u32,

    /// RSA key size for newly generated keys
    #[arg(long, env = "HARBOR_KEY_BITS", default_value_t = DEFAULT_KEY_BITS, hide = true)]
    pub key_bits: u32,
}

impl IssueArgs {
    pub fn ca_config(&self) -> CaConfig {
        CaConfig {
            cert_dir: self.dir.cert_dir.clone(),
            ca_days: self.ca_days,
            cert_days: self.cert_days,
            key_bits: self.key_bits,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct TrustArgs {
    /// Root certificate to synchronize (defaults to <cert-dir>/ca.crt)
    #[arg(long, env = "HARBOR_CA_CERT_FILE")]
    pub cert_file: Option<PathBuf>,

    #[command(flatten)]
    pub dir: CertDirArgs,

    /// Windows certificate store path
    #[arg(long, env = "HARBOR_WINDOWS_STORE", default_value = DEFAULT_WINDOWS_STORE)]
    pub windows_store: String,

    /// Anchor directory overriding the detected distribution default
    #[arg(long, env = "HARBOR_LINUX_ANCHOR_DIR", hide = true)]
    pub linux_anchor_dir: Option<PathBuf>,
}

impl TrustArgs {
    pub fn trust_config(&self) -> TrustConfig {
        let mut config = match &self.cert_file {
            Some(file) => TrustConfig::new(file),
            None => TrustConfig::for_cert_dir(&self.dir.cert_dir),
        };
        config.windows_store = self.windows_store.clone();
        config.linux_anchor_dir = self.linux_anchor_dir.clone();
        config
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the root CA and server certificate if they are missing
    Ensure(IssueArgs),

    /// Reissue the server certificate (creates the root CA if missing)
    Renew(IssueArgs),

    /// Show root CA and server certificate details
    Status {
        #[command(flatten)]
        dir: CertDirArgs,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage OS trust of the root CA
    #[command(subcommand)]
    Trust(trust::TrustCommands),
}

impl Cli {
    pub fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        if self.version {
            println!("{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }

        let Some(command) = self.command else {
            Cli::command().print_help()?;
            println!();
            return Ok(());
        };

        match command {
            Commands::Ensure(args) => cert::ensure(&args),
            Commands::Renew(args) => cert::renew(&args),
            Commands::Status { dir, json } => cert::status(&dir.cert_dir, json),
            Commands::Trust(cmd) => trust::run(cmd),
        }
    }
}
