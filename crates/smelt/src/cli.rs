//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// smelt - staged configuration engine for OS provisioning
#[derive(Parser, Debug)]
#[command(name = "smelt")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a named provisioning stage
    Run(RunArgs),

    /// Show version information
    Version(VersionArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Stage to run
    pub stage: String,

    /// Fail on any configuration source error instead of skipping it
    #[arg(long)]
    pub strict: bool,

    /// Extra directory to scan for configuration files (repeatable,
    /// processed in the order given)
    #[arg(short = 's', long = "source")]
    pub sources: Vec<Utf8PathBuf>,

    /// Boot command line to parse
    #[arg(long, default_value = "/proc/cmdline")]
    pub cmdline: Utf8PathBuf,

    /// Base configuration file
    #[arg(short, long)]
    pub config: Option<Utf8PathBuf>,

    /// Working directory for stage commands
    #[arg(long, default_value = ".")]
    pub work_dir: Utf8PathBuf,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
