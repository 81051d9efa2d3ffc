//! Error types surfaced by the vault core.
//!
//! Wrong-password and corrupted-index failures are deliberately collapsed
//! into [`Error::InvalidPassword`]: an attacker holding a tampered vault
//! learns nothing from the error text.

use std::path::PathBuf;

use thiserror::Error;

use crate::crypto::CryptoError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed argument: empty password, wrong salt length, bad path.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The directory does not contain a readable vault identity file.
    #[error("not a vault: {}", .0.display())]
    NotAVault(PathBuf),

    /// A sibling with the same name, or a target path that must not exist.
    #[error("already exists: {0}")]
    Exists(String),

    /// Index decryption failed. Wrong password and index corruption are
    /// cryptographically indistinguishable and are reported identically.
    #[error("invalid password or corrupted vault")]
    InvalidPassword,

    /// Authenticated decryption of a data blob failed: the vault is
    /// corrupt or has been tampered with.
    #[error("decryption failed: vault data is corrupted or has been tampered with")]
    DecryptFailure,

    /// A file or directory is held open by another process. Contains the
    /// offending paths so the shell can tell the user what to close.
    #[error("resource busy: {}", format_busy_paths(.0))]
    ResourceBusy(Vec<PathBuf>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation not allowed in the current session state.
    #[error("operation not allowed while session is {0}")]
    InvalidState(&'static str),
}

impl From<CryptoError> for Error {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidInput(msg) => Error::InvalidInput(msg),
            CryptoError::DecryptFailure => Error::DecryptFailure,
        }
    }
}

fn format_busy_paths(paths: &[PathBuf]) -> String {
    const SHOWN: usize = 5;
    let mut shown: Vec<String> = paths
        .iter()
        .take(SHOWN)
        .map(|p| p.display().to_string())
        .collect();
    if paths.len() > SHOWN {
        shown.push(format!("... and {} more", paths.len() - SHOWN));
    }
    shown.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_paths_are_truncated_in_message() {
        let paths: Vec<PathBuf> = (0..8).map(|i| PathBuf::from(format!("/w/f{i}.md"))).collect();
        let msg = Error::ResourceBusy(paths).to_string();
        assert!(msg.contains("/w/f0.md"));
        assert!(msg.contains("and 3 more"));
    }

    #[test]
    fn invalid_password_message_reveals_nothing() {
        // Corruption and wrong password must render the same text.
        let msg = Error::InvalidPassword.to_string();
        assert!(!msg.contains("tag"));
        assert!(!msg.contains("nonce"));
    }
}
