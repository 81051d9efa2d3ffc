//! `obsec open`: unlock, edit, lock.
//!
//! Unlocks the vault into a workspace, optionally launches the external
//! editor, waits for the user, then locks. A busy workspace (files still
//! open in the editor) keeps the session unlocked and offers a retry;
//! the encrypted vault is already consistent at that point.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::warn;

use obsec_core::session::SessionConfig;
use obsec_core::Error;

use crate::auth::PasswordOptions;
use crate::progress::StepBar;

#[derive(ClapArgs)]
pub struct Args {
    /// Vault directory
    pub vault: PathBuf,

    /// External editor executable to launch on the workspace
    #[arg(long, env = "OBSEC_EDITOR")]
    pub editor: Option<PathBuf>,

    /// Do not launch an editor even if one is configured
    #[arg(long)]
    pub no_editor: bool,
}

pub fn run(args: &Args, password: &PasswordOptions, base: Option<&PathBuf>) -> Result<()> {
    let handle = obsec_core::vault::open(&args.vault)?;
    let passphrase = password.resolve()?;

    let mut config = SessionConfig {
        editor: args.editor.clone(),
        ..SessionConfig::default()
    };
    if let Some(base) = base {
        config.workspace_base = base.clone();
    }

    let bar = StepBar::new("Unlocking");
    let mut session = handle
        .unlock(&passphrase, &config, |done, total| bar.update(done, total))
        .context("unlock failed")?;
    bar.finish();
    drop(passphrase);

    println!("Workspace: {}", session.workspace_path().display());

    if !args.no_editor && args.editor.is_some() {
        match session.launch_editor() {
            Ok(child) => println!("Editor launched (pid {})", child.id()),
            Err(e) => warn!(error = %e, "could not launch editor"),
        }
    }

    wait_for_enter("Press Enter to lock the vault...")?;

    loop {
        let bar = StepBar::new("Locking");
        match session.lock(|done, total| bar.update(done, total)) {
            Ok(()) => {
                bar.finish();
                println!("Vault locked.");
                return Ok(());
            }
            Err(Error::ResourceBusy(paths)) => {
                bar.finish();
                eprintln!("The workspace is still in use:");
                for path in &paths {
                    eprintln!("  {}", path.display());
                }
                eprintln!("The encrypted vault is up to date; only cleanup remains.");
                wait_for_enter("Close the programs above, then press Enter to retry...")?;
            }
            Err(e) => return Err(e).context("lock failed"),
        }
    }
}

fn wait_for_enter(message: &str) -> Result<()> {
    eprint!("{message}");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(())
}
