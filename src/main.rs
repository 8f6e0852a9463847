mod cli;
mod error;

use clap::{CommandFactory, Parser};
use exn::ResultExt;
use futures::TryStreamExt;
use std::io::Write;
use std::path::PathBuf;
use std::pin::pin;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use unsync_config::Config;
use unsync_rebuild::Context;

use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:?}");
            return ExitCode::FAILURE;
        },
    };
    init_tracing(cli.log_level(), config.log.as_deref());

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        },
    }
}

/// Log to stderr. The verbosity flags win over the configured level, and
/// `RUST_LOG` is merged on top of whichever applies.
fn init_tracing(flags: Option<&str>, configured: Option<&str>) {
    let base = flags.or(configured).unwrap_or("info");
    let filter = match std::env::var("RUST_LOG").ok().filter(|value| !value.trim().is_empty()) {
        Some(env) => EnvFilter::try_new(format!("{base},{env}"))
            .or_else(|_| EnvFilter::try_new(&env))
            .unwrap_or_else(|_| EnvFilter::new(base)),
        None => EnvFilter::new(base),
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    tracing::debug!(base, "Initialized logging");
}

/// Print a usage error and exit with clap's usage exit code.
fn usage_error(message: impl std::fmt::Display) -> ! {
    Cli::command().error(clap::error::ErrorKind::ValueValidation, message).exit()
}

/// The manifest to read: `--manifest`, else the configured one, else the
/// most recent backup's.
fn manifest(cli: &Cli, config: &Config) -> PathBuf {
    let manifest = match &cli.manifest {
        Some(manifest) => manifest.clone(),
        None => match config.manifest() {
            Ok(manifest) => manifest,
            Err(e) => usage_error(format!("no manifest given and none could be found ({e})")),
        },
    };
    if !manifest.is_file() {
        usage_error(format!("manifest '{}' does not exist", manifest.display()));
    }
    manifest
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let mut out = std::io::stdout().lock();
    match &cli.command {
        Command::Manifests => {
            let dir = config.backup_dir().or_raise(|| ErrorKind::Discovery)?;
            tracing::info!(dir = %dir.display(), "Listing manifests");
            for manifest in unsync_config::manifests(&dir).or_raise(|| ErrorKind::Discovery)? {
                writeln!(out, "{}", manifest.display()).or_raise(|| ErrorKind::Output)?;
            }
        },
        Command::Domains => {
            let manifest = manifest(&cli, &config);
            tracing::info!(manifest = %manifest.display(), "Listing domains");
            let mut domains = pin!(unsync_manifest::domains(&manifest));
            while let Some(domain) = domains.try_next().await.or_raise(|| ErrorKind::Manifest)? {
                writeln!(out, "{domain}").or_raise(|| ErrorKind::Output)?;
            }
        },
        Command::Files { domain } => {
            let manifest = manifest(&cli, &config);
            tracing::info!(manifest = %manifest.display(), "Listing files");
            let mut files = pin!(unsync_manifest::files(&manifest, domain.as_deref()));
            while let Some(entry) = files.try_next().await.or_raise(|| ErrorKind::Manifest)? {
                writeln!(out, "{}\t{}\t{}", entry.file_id, entry.domain, entry.relative_path)
                    .or_raise(|| ErrorKind::Output)?;
            }
        },
        Command::Rebuild { domain, output, .. } => {
            let manifest = manifest(&cli, &config);
            let output = output.clone().unwrap_or_else(|| config.output.clone());
            if !output.is_dir() {
                usage_error(format!("output directory '{}' does not exist", output.display()));
            }
            let ctx = Context::new(output).with_postprocess(cli.postprocess().unwrap_or(config.postprocess));
            if domain.is_none() {
                tracing::warn!("No domain given, copying every file in the backup");
            }
            tracing::info!(manifest = %manifest.display(), "Rebuilding file structure");
            let summary =
                unsync_rebuild::rebuild_all(&manifest, domain.as_deref(), &ctx).await.or_raise(|| ErrorKind::Rebuild)?;
            writeln!(out, "{summary}").or_raise(|| ErrorKind::Output)?;
        },
        Command::FileId { domain, relative_path } => {
            writeln!(out, "{}", unsync_manifest::file_id(domain, relative_path)).or_raise(|| ErrorKind::Output)?;
        },
    }
    out.flush().or_raise(|| ErrorKind::Output)
}
