//! Cryptographic primitives: password KDF, subkey derivation, and the
//! authenticated blob format.
//!
//! The key hierarchy has three levels. The password enters Argon2id and
//! yields the master key; HKDF binds the master key to the vault
//! identifier to yield the vault key; HKDF binds the vault key to each
//! file identifier to yield per-file keys. The index blob is encrypted
//! under the vault key, every data blob under its file key.

pub mod blob;
pub mod kdf;
pub mod keys;
pub mod subkeys;

use thiserror::Error;

/// Errors from the crypto layer.
///
/// Decryption failures carry no detail on purpose: an unparsable header,
/// an unknown format version, a mismatched algorithm and a failed
/// authentication tag all surface as the same [`CryptoError::DecryptFailure`],
/// so callers (and their error text) cannot become a format oracle.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("decryption failed: wrong key or corrupted/tampered data")]
    DecryptFailure,
}

pub use blob::{open, peek_header_salt, seal};
pub use kdf::derive_master_key;
pub use keys::{FileKey, MasterKey, SecretKey, VaultKey, KEY_SIZE};
pub use subkeys::{derive_file_key, derive_vault_key};
