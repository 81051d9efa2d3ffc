//! Passphrase acquisition.

use std::io::{self, IsTerminal, Read, Write};

use anyhow::{bail, Result};
use rpassword::read_password;

/// Passphrase sources, in priority order: `--password` / `OBSEC_PASSWORD`,
/// `--password-stdin`, interactive prompt.
#[derive(Clone, Default)]
pub struct PasswordOptions {
    pub password: Option<String>,
    pub password_stdin: bool,
}

impl PasswordOptions {
    /// Resolve the passphrase for unlocking an existing vault.
    pub fn resolve(&self) -> Result<String> {
        if let Some(password) = &self.password {
            return Ok(password.clone());
        }
        if self.password_stdin {
            return read_from_stdin();
        }
        prompt("Vault passphrase: ")
    }

    /// Resolve a passphrase for a new vault, with interactive
    /// confirmation when prompting.
    pub fn resolve_new(&self) -> Result<String> {
        if self.password.is_some() || self.password_stdin {
            return self.resolve();
        }
        let first = prompt("New vault passphrase: ")?;
        let second = prompt("Repeat passphrase: ")?;
        if first != second {
            bail!("passphrases do not match");
        }
        Ok(first)
    }
}

/// Prompt on stderr with hidden input.
fn prompt(message: &str) -> Result<String> {
    if !io::stdin().is_terminal() {
        bail!("no terminal for passphrase prompt; use --password-stdin or OBSEC_PASSWORD");
    }
    eprint!("{message}");
    io::stderr().flush()?;
    let passphrase = read_password()?;
    if passphrase.is_empty() {
        bail!("passphrase cannot be empty");
    }
    Ok(passphrase)
}

fn read_from_stdin() -> Result<String> {
    let mut line = String::new();
    io::stdin().read_to_string(&mut line)?;
    let passphrase = line.trim_end_matches(['\r', '\n']).to_string();
    if passphrase.is_empty() {
        bail!("empty passphrase on stdin");
    }
    Ok(passphrase)
}
