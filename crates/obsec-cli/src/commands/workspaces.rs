//! `obsec workspaces`: list leftover workspaces from crashed sessions.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args as ClapArgs;

use obsec_core::session::{list_leftover_workspaces, SessionConfig};

#[derive(ClapArgs)]
pub struct Args {}

pub fn run(_args: &Args, base: Option<&PathBuf>) -> Result<()> {
    let config = session_config(base);
    let leftovers = list_leftover_workspaces(&config)?;
    if leftovers.is_empty() {
        println!("No leftover workspaces.");
        return Ok(());
    }
    println!("Leftover workspaces (from crashed sessions):");
    for path in &leftovers {
        println!("  {}", path.display());
    }
    println!("Run `obsec clean` to securely delete them.");
    Ok(())
}

pub fn session_config(base: Option<&PathBuf>) -> SessionConfig {
    let mut config = SessionConfig::default();
    if let Some(base) = base {
        config.workspace_base = base.clone();
    }
    config
}
