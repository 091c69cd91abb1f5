mod cli;
mod commands;
mod output;

use std::error::Error;

use clap::Parser;
use harbor_pki::PkiError;
use tracing_subscriber::EnvFilter;

use cli::Cli;

fn main() {
    // Usage errors exit 1 like every other failure; help and version exit 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if cli.verbose {
                EnvFilter::new("info")
            } else {
                EnvFilter::new("warn")
            }
        }))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli.run() {
        output::error_stderr(error_tag(e.as_ref()), &e.to_string());
        std::process::exit(1);
    }
}

fn error_tag(err: &(dyn Error + 'static)) -> &'static str {
    if let Some(pki) = err.downcast_ref::<PkiError>() {
        return pki.tag();
    }
    if err.is::<std::io::Error>() {
        return "io";
    }
    "error"
}
