//! pl-pages: publish a directory to a Git branch and deploy it to permanent storage.
//!
//! # Usage
//!
//! ```text
//! pl-pages -d <dir> [--branch pl-pages] [--src '**/*'] [--no-deploy] ...
//! pl-pages publish -d <dir> ...
//! pl-pages clean
//! pl-pages set-branch [--repo <url>] [--wallet <keyfile>] <branch>
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{publish::PublishArgs, set_branch::SetBranchArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "pl-pages",
    version,
    about = "Publish files to a Git branch and deploy them to permanent storage",
    long_about = None,
    args_conflicts_with_subcommands = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Publishing is the default command.
    #[command(flatten)]
    publish: PublishArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Commit a directory to the deployment branch, push, and deploy it.
    Publish(PublishArgs),

    /// Remove every cached checkout.
    Clean,

    /// Set the repository's deployment branch in the registry.
    SetBranch(SetBranchArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Publish(cli.publish)) {
        Commands::Publish(args) => args.run(),
        Commands::Clean => commands::clean::run(),
        Commands::SetBranch(args) => args.run(),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Multi-threaded runtime for the async deployment path.
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}
