//! `obsec clean`: securely delete leftover workspaces, with consent.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Args as ClapArgs;

use obsec_core::session::{clean_leftover_workspaces, list_leftover_workspaces};

use super::workspaces::session_config;

#[derive(ClapArgs)]
pub struct Args {
    /// Delete without asking
    #[arg(long)]
    pub yes: bool,
}

pub fn run(args: &Args, base: Option<&PathBuf>) -> Result<()> {
    let config = session_config(base);
    let leftovers = list_leftover_workspaces(&config)?;
    if leftovers.is_empty() {
        println!("No leftover workspaces.");
        return Ok(());
    }

    println!("The following workspaces will be securely deleted:");
    for path in &leftovers {
        println!("  {}", path.display());
    }
    println!("They may contain unsaved work from a crashed session; the vault keys are gone, so their contents cannot be re-encrypted.");

    if !args.yes && !confirm(&format!("Delete {} workspace(s)? [y/N] ", leftovers.len()))? {
        println!("Nothing deleted.");
        return Ok(());
    }

    clean_leftover_workspaces(&leftovers)?;
    println!("Deleted {} workspace(s).", leftovers.len());
    Ok(())
}

fn confirm(message: &str) -> Result<bool> {
    eprint!("{message}");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}
