//! `obsec info`: identity and blob count, no password required.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args as ClapArgs;

use obsec_core::vault::VaultLayout;

#[derive(ClapArgs)]
pub struct Args {
    /// Vault directory
    pub directory: PathBuf,
}

pub fn run(args: &Args) -> Result<()> {
    let handle = obsec_core::vault::open(&args.directory)?;
    let layout = VaultLayout::new(&args.directory);
    let blobs = layout.list_blobs()?;

    println!("Vault:      {}", args.directory.display());
    println!("Identifier: {}", handle.id());
    println!("Data blobs: {}", blobs.len());
    println!(
        "Index:      {}",
        if layout.index_path().exists() {
            "present"
        } else {
            "MISSING"
        }
    );
    Ok(())
}
