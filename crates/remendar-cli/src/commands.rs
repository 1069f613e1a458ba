//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Remendador: maintenance CLI for Remendar reference namespace files
#[derive(Parser, Debug)]
#[command(name = "remendador")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Healer configuration file (YAML or JSON)
    #[arg(short, long, global = true, env = "REMENDAR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check namespace files against the reference invariants
    ///
    /// Reports empty primaries, blank or duplicate fallbacks and fallbacks
    /// that repeat the primary. Exits non-zero when anything is found.
    Check(CheckArgs),

    /// Print the entries of a namespace file
    Show(ShowArgs),

    /// Promote a reference to primary, as a successful heal would
    Promote(PromoteArgs),
}

/// Arguments for the check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Namespace files to check
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

/// Arguments for the show command
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Namespace file
    pub file: PathBuf,

    /// Only this element key
    pub key: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: ShowFormat,
}

/// Output format for show
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShowFormat {
    /// Indented text
    #[default]
    Text,
    /// Namespace JSON
    Json,
}

/// Arguments for the promote command
#[derive(Parser, Debug)]
pub struct PromoteArgs {
    /// Namespace file (created if missing)
    pub file: PathBuf,

    /// Element key
    pub key: String,

    /// Reference to make primary
    pub reference: String,

    /// Override the retained fallback history cap
    #[arg(long)]
    pub fallback_cap: Option<usize>,
}
