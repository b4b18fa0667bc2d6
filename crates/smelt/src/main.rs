//! smelt CLI - staged configuration engine for OS provisioning
//!
//! This is the main entry point for the smelt command-line interface.

mod cli;
mod commands;
mod version;

use anyhow::Result;
use clap::Parser;
use smelt_core::Verbosity;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls crypto provider (required for rustls 0.23+)
    // This must be done before any TLS operations
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    // Parse CLI args
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose, cli.quiet);

    // Diagnostics are verbosity-gated through an explicit capability, not
    // by reading global subscriber state back
    let verbosity = if cli.verbose > 0 {
        Verbosity::Debug
    } else {
        Verbosity::Normal
    };

    // Run command
    match cli.command {
        Commands::Run(args) => commands::run::run(args, verbosity).await,
        Commands::Version(args) => commands::version::run(args),
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}
