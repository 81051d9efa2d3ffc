//! Key material containers.
//!
//! All keys are 256-bit secrets held in [`secrecy::Secret`], which keeps
//! them out of `Debug` output and zeroes the memory on drop. Access is
//! scoped: callers get the raw bytes only inside a closure and must not
//! let them escape.

use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, Secret};

/// All keys in the hierarchy are 32 bytes (AES-256).
pub const KEY_SIZE: usize = 32;

/// A 256-bit secret key, zeroized on drop.
pub struct SecretKey(Secret<[u8; KEY_SIZE]>);

impl SecretKey {
    pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
        SecretKey(Secret::new(bytes))
    }

    /// Generate a fresh random key from the OS CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        SecretKey(Secret::new(bytes))
    }

    /// Execute a closure with access to the raw key bytes.
    ///
    /// The bytes must not escape the closure; the backing buffer is owned
    /// by the `Secret` and is zeroized when the key is dropped.
    pub fn with_bytes<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[u8; KEY_SIZE]) -> R,
    {
        f(self.0.expose_secret())
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SecretKey").field(&"[REDACTED]").finish()
    }
}

/// Key derived from the password via Argon2id. Never touches disk.
#[derive(Debug)]
pub struct MasterKey(pub(crate) SecretKey);

/// Key binding the master key to one vault. Encrypts the index blob.
#[derive(Debug)]
pub struct VaultKey(pub(crate) SecretKey);

/// Key binding the vault key to one file identifier. Encrypts that
/// file's data blob and nothing else.
#[derive(Debug)]
pub struct FileKey(pub(crate) SecretKey);

impl MasterKey {
    pub fn secret(&self) -> &SecretKey {
        &self.0
    }
}

impl VaultKey {
    pub fn secret(&self) -> &SecretKey {
        &self.0
    }
}

impl FileKey {
    pub fn secret(&self) -> &SecretKey {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_keys_differ() {
        let a = SecretKey::random();
        let b = SecretKey::random();
        let equal = a.with_bytes(|ab| b.with_bytes(|bb| ab == bb));
        assert!(!equal);
    }

    #[test]
    fn debug_output_redacts_key_bytes() {
        let key = SecretKey::new([0xAB; KEY_SIZE]);
        let rendered = format!("{key:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("ab"));
        assert!(!rendered.contains("171"));
    }
}
