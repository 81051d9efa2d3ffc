//! On-disk vault layout and opaque identifiers.
//!
//! A vault directory holds exactly three kinds of entries:
//!
//! - `.vault_id`: 32 hex characters of the 16-byte vault identifier,
//!   trailing newline. Plaintext; its presence is what makes a directory
//!   a vault.
//! - `index.enc`: the encrypted index blob.
//! - `<hex(file_id)>.enc`: one data blob per file node.
//!
//! Everything else about the vault (names, structure) is opaque; the
//! index is the only authority.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;

use crate::error::{Error, Result};

pub const VAULT_ID_FILE: &str = ".vault_id";
pub const INDEX_FILE: &str = "index.enc";
pub const BLOB_EXTENSION: &str = "enc";

pub const ID_SIZE: usize = 16;

fn decode_id(s: &str) -> Result<[u8; ID_SIZE]> {
    let decoded =
        hex::decode(s.trim()).map_err(|_| Error::InvalidInput(format!("invalid identifier: {s:?}")))?;
    decoded
        .try_into()
        .map_err(|_| Error::InvalidInput(format!("identifier must be {ID_SIZE} bytes")))
}

/// Identifies a vault. Random at creation, immutable afterwards; bound
/// into the vault-key derivation so ciphertext cannot be transplanted
/// between vaults.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VaultId([u8; ID_SIZE]);

impl VaultId {
    pub fn random() -> Self {
        let mut bytes = [0u8; ID_SIZE];
        OsRng.fill_bytes(&mut bytes);
        VaultId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        decode_id(s).map(VaultId)
    }
}

impl fmt::Display for VaultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for VaultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VaultId({})", hex::encode(self.0))
    }
}

/// Names a logical file independently of its human-readable name. The
/// identifier survives renames, so a rename never rewrites ciphertext.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(#[serde_as(as = "Base64")] [u8; ID_SIZE]);

impl FileId {
    pub fn random() -> Self {
        let mut bytes = [0u8; ID_SIZE];
        OsRng.fill_bytes(&mut bytes);
        FileId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        decode_id(s).map(FileId)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", hex::encode(self.0))
    }
}

/// Path arithmetic for one vault directory.
#[derive(Debug, Clone)]
pub struct VaultLayout {
    root: PathBuf,
}

impl VaultLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        VaultLayout { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn vault_id_path(&self) -> PathBuf {
        self.root.join(VAULT_ID_FILE)
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    pub fn blob_path(&self, id: &FileId) -> PathBuf {
        self.root.join(format!("{}.{}", id.to_hex(), BLOB_EXTENSION))
    }

    /// A directory is a vault iff `.vault_id` exists and parses.
    pub fn is_vault(&self) -> bool {
        self.read_vault_id().is_ok()
    }

    pub fn read_vault_id(&self) -> Result<VaultId> {
        let raw = fs::read_to_string(self.vault_id_path())
            .map_err(|_| Error::NotAVault(self.root.clone()))?;
        VaultId::from_hex(&raw).map_err(|_| Error::NotAVault(self.root.clone()))
    }

    pub fn write_vault_id(&self, id: &VaultId) -> Result<()> {
        crate::io::atomic_write(&self.vault_id_path(), format!("{}\n", id.to_hex()).as_bytes())?;
        Ok(())
    }

    /// Enumerate data blobs on disk (the index blob excluded). An entry
    /// here without an index node is an orphan: safe, eligible for GC.
    pub fn list_blobs(&self) -> Result<Vec<(FileId, PathBuf)>> {
        let suffix = format!(".{BLOB_EXTENSION}");
        let mut blobs = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == INDEX_FILE {
                continue;
            }
            if let Some(stem) = name.strip_suffix(&suffix) {
                if let Ok(id) = FileId::from_hex(stem) {
                    blobs.push((id, path));
                }
            }
        }
        Ok(blobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn vault_id_hex_round_trip() {
        let id = VaultId::random();
        let parsed = VaultId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, parsed);
        assert_eq!(id.to_hex().len(), 32);
    }

    #[test]
    fn vault_id_rejects_garbage() {
        assert!(VaultId::from_hex("not hex").is_err());
        assert!(VaultId::from_hex("abcd").is_err());
    }

    #[test]
    fn identity_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let layout = VaultLayout::new(dir.path());
        assert!(!layout.is_vault());

        let id = VaultId::random();
        layout.write_vault_id(&id).unwrap();
        assert!(layout.is_vault());
        assert_eq!(layout.read_vault_id().unwrap(), id);

        let raw = fs::read_to_string(layout.vault_id_path()).unwrap();
        assert!(raw.ends_with('\n'));
        assert_eq!(raw.trim().len(), 32);
    }

    #[test]
    fn missing_identity_is_not_a_vault() {
        let dir = TempDir::new().unwrap();
        let layout = VaultLayout::new(dir.path());
        assert!(matches!(layout.read_vault_id(), Err(Error::NotAVault(_))));
    }

    #[test]
    fn list_blobs_skips_index_and_foreign_files() {
        let dir = TempDir::new().unwrap();
        let layout = VaultLayout::new(dir.path());
        let id = FileId::random();
        fs::write(layout.blob_path(&id), b"blob").unwrap();
        fs::write(layout.index_path(), b"index").unwrap();
        fs::write(dir.path().join("stray.txt"), b"x").unwrap();
        fs::write(dir.path().join("nothex.enc"), b"x").unwrap();

        let blobs = layout.list_blobs().unwrap();
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].0, id);
    }
}
