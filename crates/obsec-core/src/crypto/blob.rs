//! Authenticated encrypted blob format.
//!
//! On-disk layout of every `.enc` file:
//!
//! ```text
//! | header_len: 4 bytes LE | header JSON | ciphertext | tag: 16 bytes |
//! ```
//!
//! The header JSON is `{"version":1,"alg":"AES-256-GCM","nonce":...}` with
//! binary fields base64-encoded. The raw header bytes are bound into the
//! GCM associated data, so any change to version, algorithm or nonce fails
//! authentication. The index blob additionally carries the vault salt in
//! its header (readable before key derivation via [`peek_header_salt`]);
//! data blobs do not.
//!
//! A fresh random 12-byte nonce is drawn from the OS CSPRNG for every
//! seal. Nonces are never cached or reused.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;
use zeroize::Zeroizing;

use super::keys::SecretKey;
use super::CryptoError;

pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;

const BLOB_VERSION: u32 = 1;
const BLOB_ALG: &str = "AES-256-GCM";

#[serde_as]
#[derive(Debug, Serialize, Deserialize)]
struct BlobHeader {
    version: u32,
    alg: String,
    #[serde_as(as = "Base64")]
    nonce: Vec<u8>,
    #[serde_as(as = "Option<Base64>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    salt: Option<Vec<u8>>,
}

/// Encrypt `plaintext` under `key` into a framed blob.
///
/// `header_salt` is set only for the index blob, never for data blobs.
pub fn seal(
    key: &SecretKey,
    plaintext: &[u8],
    header_salt: Option<&[u8]>,
) -> Result<Vec<u8>, CryptoError> {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let header = BlobHeader {
        version: BLOB_VERSION,
        alg: BLOB_ALG.to_string(),
        nonce: nonce.to_vec(),
        salt: header_salt.map(|s| s.to_vec()),
    };
    let header_bytes = serde_json::to_vec(&header)
        .map_err(|e| CryptoError::InvalidInput(format!("header serialization failed: {e}")))?;

    let ciphertext = key.with_bytes(|key_bytes| {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key_bytes));
        cipher.encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: &header_bytes,
            },
        )
    });
    // Encryption only fails on absurd plaintext lengths.
    let ciphertext =
        ciphertext.map_err(|_| CryptoError::InvalidInput("plaintext too large".to_string()))?;

    let mut blob = Vec::with_capacity(4 + header_bytes.len() + ciphertext.len());
    blob.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    blob.extend_from_slice(&header_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Decrypt a framed blob. The plaintext comes back in a zeroizing buffer.
///
/// Every failure mode (truncated frame, unparsable header, unknown
/// version, wrong algorithm, bad nonce length, failed tag) returns the
/// same [`CryptoError::DecryptFailure`].
pub fn open(key: &SecretKey, data: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let (header, header_bytes, body) = split_frame(data)?;

    if header.version != BLOB_VERSION
        || header.alg != BLOB_ALG
        || header.nonce.len() != NONCE_SIZE
        || body.len() < TAG_SIZE
    {
        return Err(CryptoError::DecryptFailure);
    }

    let plaintext = key.with_bytes(|key_bytes| {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key_bytes));
        cipher.decrypt(
            Nonce::from_slice(&header.nonce),
            Payload {
                msg: body,
                aad: header_bytes,
            },
        )
    });

    plaintext
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::DecryptFailure)
}

/// Read the `salt` field from a blob header without decrypting.
///
/// Used by index loading, which must re-derive the master key from the
/// salt before it can authenticate anything. The header is unauthenticated
/// at this point; the decrypted index carries the authoritative copy and
/// the two are compared after decryption.
pub fn peek_header_salt(data: &[u8]) -> Result<Option<Vec<u8>>, CryptoError> {
    let (header, _, _) = split_frame(data)?;
    Ok(header.salt)
}

fn split_frame(data: &[u8]) -> Result<(BlobHeader, &[u8], &[u8]), CryptoError> {
    if data.len() < 4 {
        return Err(CryptoError::DecryptFailure);
    }
    let header_len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let body_start = 4usize
        .checked_add(header_len)
        .ok_or(CryptoError::DecryptFailure)?;
    if data.len() < body_start {
        return Err(CryptoError::DecryptFailure);
    }
    let header_bytes = &data[4..body_start];
    let header: BlobHeader =
        serde_json::from_slice(header_bytes).map_err(|_| CryptoError::DecryptFailure)?;
    Ok((header, header_bytes, &data[body_start..]))
}
