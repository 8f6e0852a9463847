use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Rebuild the original file layout of a MobileSync device backup.
#[derive(Debug, Parser)]
#[command(name = "unsync", version)]
pub struct Cli {
    /// Increase logging verbosity (repeat for more).
    #[arg(short, long, action = ArgAction::Count, global = true, conflicts_with = "quiet")]
    pub verbose: u8,
    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,
    /// Configuration file. [defaults to <config dir>/unsync/config.toml]
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Path to manifest. [defaults to the latest backup's]
    #[arg(long, global = true, value_name = "FILE")]
    pub manifest: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print known Manifest.db files.
    Manifests,
    /// Print unique domains from the manifest.
    Domains,
    /// Print files from the manifest, as TSV: fileID, domain, relativePath.
    Files {
        /// Limit to a specific domain.
        #[arg(long)]
        domain: Option<String>,
    },
    /// Copy files out of the backup into `<output>/<domain>/<relativePath>`.
    ///
    /// Specifying a domain is recommended; otherwise it will copy ALL files!
    Rebuild {
        /// Limit to a specific domain.
        #[arg(long)]
        domain: Option<String>,
        /// Run post-processing on written files.
        #[arg(long, overrides_with = "raw")]
        post: bool,
        /// Don't run post-processing on written files.
        #[arg(long, overrides_with = "post")]
        raw: bool,
        /// Directory to write the file structure into. [defaults to the current directory]
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,
    },
    /// Print the fileID a domain and relative path are stored under.
    FileId { domain: String, relative_path: String },
}

impl Cli {
    /// Filter directives for the requested verbosity, `None` if no flag was
    /// given.
    pub fn log_level(&self) -> Option<&'static str> {
        match (self.quiet, self.verbose) {
            (true, _) => Some("warn"),
            (false, 0) => None,
            (false, 1) => Some("debug"),
            (false, _) => Some("trace"),
        }
    }

    /// `--post`/`--raw` if either was given.
    pub fn postprocess(&self) -> Option<bool> {
        match self.command {
            Command::Rebuild { post: true, .. } => Some(true),
            Command::Rebuild { raw: true, .. } => Some(false),
            _ => None,
        }
    }
}
