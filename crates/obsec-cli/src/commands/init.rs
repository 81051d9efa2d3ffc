//! `obsec init`: create a new vault.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;

use crate::auth::PasswordOptions;

#[derive(ClapArgs)]
pub struct Args {
    /// Directory for the new vault (must be empty or nonexistent)
    pub directory: PathBuf,

    /// Display name of the vault
    #[arg(long, default_value = "Notes")]
    pub name: String,
}

pub fn run(args: &Args, password: &PasswordOptions) -> Result<()> {
    let passphrase = password.resolve_new()?;
    let handle = obsec_core::vault::create(&args.directory, &args.name, &passphrase)
        .with_context(|| format!("creating vault at {}", args.directory.display()))?;
    println!(
        "Created vault '{}' at {} (id {})",
        args.name,
        args.directory.display(),
        handle.id()
    );
    Ok(())
}
