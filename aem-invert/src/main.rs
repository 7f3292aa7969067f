mod cli;
mod errors;
mod invert;
mod postprocess_cmd;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::Parser;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

/// `log.txt` (spec §6 output list, §5 "Shared resources": "the log stream
/// ... owned by exactly one rank"). One combined file per run rather than
/// one per chain — the log stream is a run-level resource, not a
/// per-replica one, the same global-file resolution `acceptance.txt`
/// already makes (see `aem_pt::Driver::write_acceptance_report`).
fn log_path(prefix: &Path) -> PathBuf {
    let mut name = prefix.file_name().and_then(|n| n.to_str()).unwrap_or("ch").to_string();
    name.push_str("-log.txt");
    prefix.with_file_name(name)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let verbosity = match &cli.command {
        Command::Invert(args) => args.verbosity.as_str(),
        Command::Postprocess(_) => "info",
    };
    let filter = || EnvFilter::try_new(verbosity).unwrap_or_else(|_| EnvFilter::new("info"));

    let log_file = match &cli.command {
        Command::Invert(args) => Some(File::create(log_path(&args.output))?),
        Command::Postprocess(_) => None,
    };

    match log_file {
        Some(file) => {
            let file_layer = tracing_subscriber::fmt::layer().with_ansi(false).with_writer(Mutex::new(file));
            let stdout_layer = tracing_subscriber::fmt::layer();
            tracing_subscriber::registry().with(filter()).with(stdout_layer).with(file_layer).init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter()).init();
        }
    }

    match cli.command {
        Command::Invert(args) => invert::run(&args)?,
        Command::Postprocess(args) => postprocess_cmd::run(&args)?,
    }
    Ok(())
}
