//! Command-line shell for ObsidianSecure vaults.

#![forbid(unsafe_code)]

mod auth;
mod commands;
mod progress;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::auth::PasswordOptions;

/// Encrypted note vaults: create, unlock, edit, lock.
#[derive(Parser)]
#[command(name = "obsec")]
#[command(author, version)]
#[command(after_help = "EXAMPLES:
    # Create a vault
    obsec init ~/notes-vault --name Notes

    # Unlock, edit in Obsidian, lock on Enter
    obsec open ~/notes-vault --editor /usr/bin/obsidian

    # Check for workspaces left by a crash
    obsec workspaces
")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Vault passphrase (insecure on shared machines; prefer
    /// --password-stdin or an interactive prompt)
    #[arg(long, env = "OBSEC_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Read the passphrase from stdin
    #[arg(long, conflicts_with = "password", global = true)]
    password_stdin: bool,

    /// Override the base directory for workspaces
    #[arg(long, global = true)]
    workspace_base: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new vault
    Init(commands::init::Args),

    /// Unlock a vault, edit, and lock it again
    Open(commands::open::Args),

    /// List workspaces left behind by crashed sessions
    Workspaces(commands::workspaces::Args),

    /// Securely delete leftover workspaces
    Clean(commands::clean::Args),

    /// Show vault identity and blob count
    Info(commands::info::Args),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let password = PasswordOptions {
        password: cli.password.clone(),
        password_stdin: cli.password_stdin,
    };

    let result = match &cli.command {
        Commands::Init(args) => commands::init::run(args, &password),
        Commands::Open(args) => commands::open::run(args, &password, cli.workspace_base.as_ref()),
        Commands::Workspaces(args) => commands::workspaces::run(args, cli.workspace_base.as_ref()),
        Commands::Clean(args) => commands::clean::run(args, cli.workspace_base.as_ref()),
        Commands::Info(args) => commands::info::run(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
