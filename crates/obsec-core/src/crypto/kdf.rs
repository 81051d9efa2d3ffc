//! Password key derivation using Argon2id.

use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroizing;

use super::keys::{MasterKey, SecretKey, KEY_SIZE};
use super::CryptoError;

/// Argon2id cost parameters, fixed for format version 1. They are not
/// stored per vault; the version field in the index blob is the hook for
/// future parameterization.
const ARGON2_MEMORY_KIB: u32 = 64 * 1024;
const ARGON2_TIME_COST: u32 = 3;
const ARGON2_PARALLELISM: u32 = 4;

/// Vault salts are exactly 16 bytes.
pub const SALT_SIZE: usize = 16;

/// Derive the 32-byte master key from a password and a 16-byte salt.
///
/// Deterministic: the same `(password, salt)` pair always yields the same
/// key. Memory-hard (64 MiB), so a single call takes a human-noticeable
/// fraction of a second by design.
///
/// # Errors
///
/// `InvalidInput` if the password is empty or the salt is not exactly
/// [`SALT_SIZE`] bytes.
pub fn derive_master_key(password: &str, salt: &[u8]) -> Result<MasterKey, CryptoError> {
    if password.is_empty() {
        return Err(CryptoError::InvalidInput(
            "password cannot be empty".to_string(),
        ));
    }
    if salt.len() != SALT_SIZE {
        return Err(CryptoError::InvalidInput(format!(
            "salt must be {SALT_SIZE} bytes, got {}",
            salt.len()
        )));
    }

    let params = Params::new(
        ARGON2_MEMORY_KIB,
        ARGON2_TIME_COST,
        ARGON2_PARALLELISM,
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptoError::InvalidInput(format!("bad Argon2 parameters: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut *okm)
        .map_err(|e| CryptoError::InvalidInput(format!("key derivation failed: {e}")))?;

    Ok(MasterKey(SecretKey::new(*okm)))
}
