//! The transient plaintext workspace.
//!
//! A workspace exists only while a session is unlocked. On clean lock it
//! is securely deleted; a workspace found on disk at startup means a
//! prior session crashed, and its deletion requires user consent (the
//! keys are gone, but the plaintext may hold unsaved work).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rand::{rngs::OsRng, RngCore};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::hash::{hash_file, ContentHash};
use crate::io::{atomic_write, secure_delete_dir};
use crate::session::{SessionConfig, WORKSPACE_PREFIX};

/// A materialized workspace directory.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create `workspace_<8 hex>` under the configured base directory.
    pub(crate) fn create(config: &SessionConfig) -> Result<Workspace> {
        fs::create_dir_all(&config.workspace_base)?;
        for _ in 0..16 {
            let mut suffix = [0u8; 4];
            OsRng.fill_bytes(&mut suffix);
            let root = config
                .workspace_base
                .join(format!("{WORKSPACE_PREFIX}{}", hex::encode(suffix)));
            match fs::create_dir(&root) {
                Ok(()) => {
                    debug!(path = %root.display(), "workspace created");
                    return Ok(Workspace { root });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(Error::Exists(
            "could not allocate a fresh workspace directory".to_string(),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Absolute path for a workspace-relative POSIX path.
    pub(crate) fn resolve(&self, rel: &str) -> PathBuf {
        let mut path = self.root.clone();
        for part in rel.split('/') {
            path.push(part);
        }
        path
    }

    /// Atomically write a decrypted file, creating parent directories.
    pub(crate) fn write_file(&self, rel: &str, data: &[u8]) -> Result<()> {
        atomic_write(&self.resolve(rel), data)?;
        Ok(())
    }

    /// Walk the workspace and hash every regular file.
    ///
    /// Returns `posix_relative_path → content hash`, skipping the
    /// configured ignored prefixes. Symlinks and other non-regular
    /// entries are not scanned.
    pub(crate) fn scan(&self, ignored: &[String]) -> Result<BTreeMap<String, ContentHash>> {
        let mut out = BTreeMap::new();
        self.scan_dir(&self.root, "", ignored, &mut out)?;
        Ok(out)
    }

    fn scan_dir(
        &self,
        dir: &Path,
        prefix: &str,
        ignored: &[String],
        out: &mut BTreeMap<String, ContentHash>,
    ) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    return Err(Error::InvalidInput(format!(
                        "non-UTF-8 file name in workspace: {raw:?}"
                    )))
                }
            };
            let rel = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };
            if is_ignored(&rel, ignored) {
                continue;
            }
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                self.scan_dir(&entry.path(), &rel, ignored, out)?;
            } else if file_type.is_file() {
                out.insert(rel, hash_file(&entry.path())?);
            }
        }
        Ok(())
    }

    /// Securely delete the whole workspace tree.
    pub(crate) fn destroy(&self) -> Result<()> {
        secure_delete_dir(&self.root)
    }
}

fn is_ignored(rel: &str, ignored: &[String]) -> bool {
    ignored
        .iter()
        .any(|prefix| rel == prefix || rel.starts_with(&format!("{prefix}/")))
}

/// Workspace directories left behind by crashed sessions.
///
/// Scanned at startup, before any vault is opened. The list is offered
/// to the user; nothing is deleted without consent.
pub fn list_leftover_workspaces(config: &SessionConfig) -> Result<Vec<PathBuf>> {
    if !config.workspace_base.exists() {
        return Ok(Vec::new());
    }
    let mut leftovers = Vec::new();
    for entry in fs::read_dir(&config.workspace_base)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if entry
            .file_name()
            .to_string_lossy()
            .starts_with(WORKSPACE_PREFIX)
        {
            leftovers.push(entry.path());
        }
    }
    leftovers.sort();
    Ok(leftovers)
}

/// Securely delete the given leftover workspaces. The caller is
/// responsible for having obtained user consent.
pub fn clean_leftover_workspaces(paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        secure_delete_dir(path)?;
        info!(path = %path.display(), "leftover workspace removed");
    }
    Ok(())
}
