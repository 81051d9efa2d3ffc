//! Vault lifecycle: creation and opening.
//!
//! Creation is all-or-nothing: if any step fails partway, everything
//! already written is secure-deleted so no half-built vault is left for
//! a later `open` to trip over.

use std::fs;
use std::path::{Path, PathBuf};

use rand::{rngs::OsRng, RngCore};
use tracing::{info, warn};

use crate::crypto::kdf::SALT_SIZE;
use crate::crypto::{derive_master_key, derive_vault_key};
use crate::error::{Error, Result};
use crate::io::secure_delete_file;
use crate::session::{Session, SessionConfig};
use crate::vault::index::Index;
use crate::vault::layout::{VaultId, VaultLayout};

/// An opened (but not unlocked) vault. Carries only the path and the
/// plaintext identifier; no key material.
#[derive(Debug, Clone)]
pub struct VaultHandle {
    layout: VaultLayout,
    id: VaultId,
}

impl VaultHandle {
    pub fn path(&self) -> &Path {
        self.layout.root()
    }

    pub fn id(&self) -> &VaultId {
        &self.id
    }

    pub(crate) fn layout(&self) -> &VaultLayout {
        &self.layout
    }

    /// Decrypt the index and materialize a plaintext workspace.
    ///
    /// Progress is reported as a monotonically increasing `(done, total)`
    /// pair. Any failure to decrypt the index is [`Error::InvalidPassword`].
    pub fn unlock(
        &self,
        password: &str,
        config: &SessionConfig,
        progress: impl FnMut(usize, usize),
    ) -> Result<Session> {
        Session::unlock(self, password, config, progress)
    }
}

/// Create a new vault in `directory`, which must be empty or nonexistent.
pub fn create(directory: &Path, vault_name: &str, password: &str) -> Result<VaultHandle> {
    if password.is_empty() {
        return Err(Error::InvalidInput("password cannot be empty".to_string()));
    }
    if directory.exists() {
        if !directory.is_dir() {
            return Err(Error::Exists(directory.display().to_string()));
        }
        if fs::read_dir(directory)?.next().is_some() {
            return Err(Error::Exists(format!(
                "directory is not empty: {}",
                directory.display()
            )));
        }
    }
    fs::create_dir_all(directory)?;

    let layout = VaultLayout::new(directory);
    let id = VaultId::random();
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);

    let result = (|| -> Result<()> {
        let master = derive_master_key(password, &salt)?;
        let vault_key = derive_vault_key(&master, id.as_bytes());

        let index = Index::new(vault_name);
        index.save(&layout, &vault_key, &salt)?;
        layout.write_vault_id(&id)?;
        Ok(())
    })();

    if let Err(e) = result {
        warn!(error = %e, "vault creation failed, rolling back");
        rollback_creation(&layout);
        return Err(e);
    }

    info!(vault_id = %id, path = %directory.display(), "vault created");
    Ok(VaultHandle { layout, id })
}

/// Open an existing vault. Fails with [`Error::NotAVault`] unless the
/// directory carries a parsable identity file.
pub fn open(directory: &Path) -> Result<VaultHandle> {
    let layout = VaultLayout::new(directory);
    let id = layout.read_vault_id()?;
    Ok(VaultHandle { layout, id })
}

fn rollback_creation(layout: &VaultLayout) {
    for path in [layout.index_path(), layout.vault_id_path()] {
        cleanup_file(&path);
    }
}

fn cleanup_file(path: &Path) {
    if path.exists() {
        if let Err(e) = secure_delete_file(path) {
            warn!(path = %path.display(), error = %e, "rollback cleanup failed");
        }
    }
}

/// Paths of orphan blobs: on-disk ciphertext with no index node. Orphans
/// are the benign direction of a crash mid-lock and are safe to delete.
pub fn orphan_blobs(layout: &VaultLayout, index: &Index) -> Result<Vec<PathBuf>> {
    let mut orphans = Vec::new();
    for (id, path) in layout.list_blobs()? {
        if !index.contains_id(&id) {
            orphans.push(path);
        }
    }
    Ok(orphans)
}

/// Recursively find vault directories under `search_path`. Vault
/// directories themselves are not descended into; they contain only
/// blobs.
pub fn discover_vaults(search_path: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    if search_path.is_dir() {
        walk_for_vaults(search_path, &mut found)?;
    }
    found.sort();
    Ok(found)
}

fn walk_for_vaults(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    if VaultLayout::new(dir).is_vault() {
        out.push(dir.to_path_buf());
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            walk_for_vaults(&entry.path(), out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PASSWORD: &str = "test-password-123";

    #[test]
    fn create_then_open() {
        let dir = TempDir::new().unwrap();
        let vault_dir = dir.path().join("vault");

        let created = create(&vault_dir, "Notes", PASSWORD).unwrap();
        assert!(vault_dir.join(".vault_id").exists());
        assert!(vault_dir.join("index.enc").exists());

        let opened = open(&vault_dir).unwrap();
        assert_eq!(opened.id(), created.id());
    }

    #[test]
    fn create_rejects_nonempty_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("occupied.txt"), b"x").unwrap();
        let err = create(dir.path(), "Notes", PASSWORD).unwrap_err();
        assert!(matches!(err, Error::Exists(_)));
    }

    #[test]
    fn create_rejects_empty_password() {
        let dir = TempDir::new().unwrap();
        let err = create(&dir.path().join("v"), "Notes", "").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn open_rejects_plain_directory() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(open(dir.path()), Err(Error::NotAVault(_))));
    }

    #[test]
    fn discover_finds_nested_vaults_only() {
        let dir = TempDir::new().unwrap();
        create(&dir.path().join("a/vault1"), "One", PASSWORD).unwrap();
        create(&dir.path().join("b/c/vault2"), "Two", PASSWORD).unwrap();
        fs::create_dir_all(dir.path().join("plain/dir")).unwrap();

        let found = discover_vaults(dir.path()).unwrap();
        assert_eq!(
            found,
            vec![dir.path().join("a/vault1"), dir.path().join("b/c/vault2")]
        );
    }

    #[test]
    fn fresh_vault_has_only_identity_and_index() {
        let dir = TempDir::new().unwrap();
        let vault_dir = dir.path().join("vault");
        create(&vault_dir, "Notes", PASSWORD).unwrap();

        let mut names: Vec<String> = fs::read_dir(&vault_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec![".vault_id".to_string(), "index.enc".to_string()]);
    }
}
