//! The unlock/edit/lock session protocol.
//!
//! Unlock decrypts the index and every referenced blob into a plaintext
//! workspace. Lock reconciles the workspace back into the vault in three
//! strict phases: scan (hash every file), diff (against the index, with
//! created/deleted pairs of equal hash folded into renames), and apply.
//! The apply order is a contract:
//!
//! 1. apply renames in the index, 2. re-encrypt modified files,
//! 3. encrypt created files, 4. drop deleted nodes from the index,
//! 5. save the index, 6. secure-delete the orphaned blobs,
//! 7. secure-delete the workspace.
//!
//! The index save lands only after every new ciphertext is on disk, and
//! blob deletion only after the index save. A crash at any point leaves
//! orphan blobs at worst, never a dangling index entry, which would
//! read as corruption on the next unlock.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};

use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

use crate::crypto::kdf::SALT_SIZE;
use crate::crypto::{blob, derive_file_key, VaultKey};
use crate::error::{Error, Result};
use crate::hash::ContentHash;
use crate::io::{atomic_write, secure_delete_file};
use crate::session::workspace::Workspace;
use crate::session::SessionConfig;
use crate::vault::index::Index;
use crate::vault::layout::{FileId, VaultLayout};
use crate::vault::manager::VaultHandle;

/// Session lifecycle. `Idle` is the terminal state after a successful
/// lock (or a forced teardown); the only live transition out of
/// `Unlocked` is into `Locking`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unlocked,
    Locking,
    Idle,
}

/// An active vault session: the decrypted index, the vault key, and the
/// plaintext workspace. Key material lives only here and is dropped
/// (zeroized) on lock.
#[derive(Debug)]
pub struct Session {
    layout: VaultLayout,
    salt: [u8; SALT_SIZE],
    vault_key: Option<VaultKey>,
    index: Index,
    workspace: Workspace,
    /// `path → hash` snapshot taken at unlock; shells can diff against
    /// it for display. Lock does not consult it; lock re-hashes.
    baseline: HashMap<String, ContentHash>,
    /// Paths the external watcher flagged as possibly changed. Display
    /// only; never trusted by lock.
    hints: BTreeSet<String>,
    ignored_paths: Vec<String>,
    editor: Option<PathBuf>,
    state: SessionState,
}

impl Session {
    /// Unlock protocol: decrypt the index, materialize the workspace,
    /// snapshot the baseline. On any failure the partially populated
    /// workspace is securely deleted and no session is returned.
    #[instrument(skip_all, fields(vault = %handle.id()))]
    pub(crate) fn unlock(
        handle: &VaultHandle,
        password: &str,
        config: &SessionConfig,
        mut progress: impl FnMut(usize, usize),
    ) -> Result<Session> {
        let layout = handle.layout().clone();
        let (index, vault_key, salt) = Index::load(&layout, password)?;

        let workspace = Workspace::create(config)?;
        let baseline = match populate(&layout, &index, &vault_key, &workspace, &mut progress) {
            Ok(baseline) => baseline,
            Err(e) => {
                warn!(error = %e, "unlock failed, discarding partial workspace");
                if let Err(cleanup) = workspace.destroy() {
                    warn!(error = %cleanup, "could not remove partial workspace");
                }
                return Err(e);
            }
        };

        info!(files = baseline.len(), workspace = %workspace.path().display(), "vault unlocked");
        Ok(Session {
            layout,
            salt,
            vault_key: Some(vault_key),
            index,
            workspace,
            baseline,
            hints: BTreeSet::new(),
            ignored_paths: config.ignored_paths.clone(),
            editor: config.editor.clone(),
            state: SessionState::Unlocked,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_unlocked(&self) -> bool {
        self.state == SessionState::Unlocked
    }

    pub fn workspace_path(&self) -> &Path {
        self.workspace.path()
    }

    /// Number of files materialized at unlock.
    pub fn file_count(&self) -> usize {
        self.baseline.len()
    }

    /// Record a watcher hint for a workspace-relative path. Hints feed
    /// shell-visible "dirty" state only; the lock protocol re-scans and
    /// re-hashes regardless, so lock correctness does not depend on the
    /// watcher.
    pub fn note_change_hint(&mut self, rel_path: &str) {
        self.hints.insert(rel_path.to_string());
    }

    /// Paths hinted as changed since unlock (display only).
    pub fn pending_hints(&self) -> Vec<String> {
        self.hints.iter().cloned().collect()
    }

    /// Paths that differ from the unlock baseline: edited or created
    /// files, plus baseline files that are gone. For shell display; the
    /// lock protocol re-derives all of this itself.
    pub fn modified_since_unlock(&self) -> Result<Vec<String>> {
        if !self.is_unlocked() {
            return Err(Error::InvalidState("locked"));
        }
        let scanned = self.workspace.scan(&self.ignored_paths)?;
        let mut changed: Vec<String> = scanned
            .iter()
            .filter(|(path, hash)| self.baseline.get(*path) != Some(*hash))
            .map(|(path, _)| path.clone())
            .collect();
        for path in self.baseline.keys() {
            if !scanned.contains_key(path) {
                changed.push(path.clone());
            }
        }
        changed.sort();
        Ok(changed)
    }

    /// Lock protocol. Idempotent under retry: a failed lock leaves the
    /// session `Unlocked` with the workspace intact, and the on-disk
    /// vault is never left with dangling index entries.
    #[instrument(skip_all)]
    pub fn lock(&mut self, mut progress: impl FnMut(usize, usize)) -> Result<()> {
        match self.state {
            SessionState::Locking => return Err(Error::InvalidState("locking")),
            SessionState::Idle => return Err(Error::InvalidState("locked")),
            SessionState::Unlocked => {}
        }
        self.state = SessionState::Locking;

        match self.reconcile(&mut progress) {
            Ok(()) => {
                // Drop key material; `Secret` zeroizes on drop.
                self.vault_key = None;
                self.baseline.clear();
                self.hints.clear();
                self.state = SessionState::Idle;
                info!("vault locked");
                Ok(())
            }
            Err(e) => {
                // The workspace is intact; the encrypted vault is
                // consistent up to whatever step completed. Retry is
                // always safe.
                self.state = SessionState::Unlocked;
                Err(e)
            }
        }
    }

    fn reconcile(&mut self, progress: &mut impl FnMut(usize, usize)) -> Result<()> {
        let vault_key = self
            .vault_key
            .as_ref()
            .ok_or(Error::InvalidState("locked"))?;

        // Phase A: scan. Fresh hashes for every regular file; watcher
        // hints are not consulted.
        let scanned = self.workspace.scan(&self.ignored_paths)?;

        // Phase B: diff against the index.
        let indexed: BTreeMap<String, (FileId, ContentHash)> = self
            .index
            .files()
            .into_iter()
            .map(|(path, node)| (path, (node.id, node.content_hash)))
            .collect();

        let mut modified: Vec<(String, FileId)> = Vec::new();
        let mut created: Vec<String> = Vec::new();
        for (path, hash) in &scanned {
            match indexed.get(path) {
                Some((id, recorded)) if recorded != hash => modified.push((path.clone(), *id)),
                Some(_) => {}
                None => created.push(path.clone()),
            }
        }
        let mut deleted: Vec<String> = indexed
            .keys()
            .filter(|path| !scanned.contains_key(*path))
            .cloned()
            .collect();

        // A created path whose hash matches a deleted entry's recorded
        // hash is the same logical file under a new name: turn the pair
        // into an index move so the identifier, and with it the
        // ciphertext blob, survives the rename.
        let mut renamed: Vec<(String, String)> = Vec::new();
        created.retain(|new_path| {
            let matching = deleted
                .iter()
                .position(|old| indexed[old].1 == scanned[new_path]);
            match matching {
                Some(pos) => {
                    renamed.push((deleted.remove(pos), new_path.clone()));
                    false
                }
                None => true,
            }
        });

        debug!(
            modified = modified.len(),
            created = created.len(),
            renamed = renamed.len(),
            deleted = deleted.len(),
            "reconciliation diff"
        );

        let total = modified.len() + created.len() + renamed.len() + deleted.len() + 2;
        let mut done = 0;
        progress(done, total);

        // Renames are pure index mutations; no ciphertext is touched.
        for (old_path, new_path) in &renamed {
            self.index.move_file(old_path, new_path)?;
            done += 1;
            progress(done, total);
        }

        // Re-encrypt modified files under their existing identifiers.
        for (path, id) in &modified {
            self.encrypt_into_blob(vault_key, path, id)?;
            self.index.set_content_hash(path, scanned[path])?;
            done += 1;
            progress(done, total);
        }

        // Created files get fresh identifiers and any missing ancestor
        // folders.
        for path in &created {
            let id = self.fresh_file_id();
            let (parent, name) = split_parent(path);
            self.index.ensure_folders(parent)?;
            self.encrypt_into_blob(vault_key, path, &id)?;
            self.index.add_file(parent, name, id, scanned[path])?;
            done += 1;
            progress(done, total);
        }

        // Drop deleted entries from the index. Their blobs stay on disk
        // until the index save has landed.
        let mut orphaned: Vec<FileId> = Vec::new();
        for path in &deleted {
            orphaned.extend(self.index.remove(path)?);
        }

        // Persist the index. From here on the vault reflects the
        // workspace.
        self.index.save(&self.layout, vault_key, &self.salt)?;
        done += 1;
        progress(done, total);

        // Now the blobs of removed entries are orphans; delete them. A
        // crash in between leaves orphans, which are harmless.
        for id in &orphaned {
            secure_delete_file(&self.layout.blob_path(id))?;
            done += 1;
            progress(done, total);
        }

        // Erase the plaintext. ResourceBusy here keeps the session
        // unlocked; the vault is already consistent and retrying lock is
        // just another secure delete.
        self.workspace.destroy()?;
        done += 1;
        progress(done, total);
        Ok(())
    }

    fn encrypt_into_blob(&self, vault_key: &VaultKey, path: &str, id: &FileId) -> Result<()> {
        let plaintext = Zeroizing::new(fs::read(self.workspace.resolve(path))?);
        let file_key = derive_file_key(vault_key, id.as_bytes());
        let sealed = blob::seal(file_key.secret(), &plaintext, None)?;
        atomic_write(&self.layout.blob_path(id), &sealed)?;
        Ok(())
    }

    fn fresh_file_id(&self) -> FileId {
        loop {
            let id = FileId::random();
            if !self.index.contains_id(&id) && !self.layout.blob_path(&id).exists() {
                return id;
            }
        }
    }

    /// Recovery path: secure-delete the workspace and discard the keys
    /// without re-encrypting anything. Workspace edits since unlock are
    /// lost; the encrypted vault keeps its pre-unlock state.
    pub fn force_unlock_delete_workspace(&mut self) -> Result<()> {
        if self.state != SessionState::Unlocked {
            return Err(Error::InvalidState("locked"));
        }
        self.workspace.destroy()?;
        self.vault_key = None;
        self.baseline.clear();
        self.hints.clear();
        self.state = SessionState::Idle;
        info!("session discarded without re-encryption");
        Ok(())
    }

    /// Spawn the configured external editor on the workspace. Does not
    /// wait for the editor to exit.
    pub fn launch_editor(&self) -> Result<Child> {
        if !self.is_unlocked() {
            return Err(Error::InvalidState("locked"));
        }
        let editor = self
            .editor
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("no editor configured".to_string()))?;
        let child = Command::new(editor)
            .arg(self.workspace.path())
            .current_dir(self.workspace.path())
            .spawn()?;
        info!(editor = %editor.display(), "editor launched");
        Ok(child)
    }
}

fn populate(
    layout: &VaultLayout,
    index: &Index,
    vault_key: &VaultKey,
    workspace: &Workspace,
    progress: &mut impl FnMut(usize, usize),
) -> Result<HashMap<String, ContentHash>> {
    let files = index.files();
    let total = files.len();
    progress(0, total);

    let mut baseline = HashMap::with_capacity(total);
    for (done, (path, node)) in files.into_iter().enumerate() {
        let blob_path = layout.blob_path(&node.id);
        let data = fs::read(&blob_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                // Dangling index entry: corruption, not a missing file.
                Error::DecryptFailure
            } else {
                Error::from(e)
            }
        })?;
        let file_key = derive_file_key(vault_key, node.id.as_bytes());
        let plaintext = blob::open(file_key.secret(), &data)?;
        workspace.write_file(&path, &plaintext)?;
        baseline.insert(path, node.content_hash);
        progress(done + 1, total);
    }
    Ok(baseline)
}

fn split_parent(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_parent_handles_root_and_nested() {
        assert_eq!(split_parent("a.md"), ("", "a.md"));
        assert_eq!(split_parent("x/y/a.md"), ("x/y", "a.md"));
    }
}
