//! The encrypted index: the authoritative tree of folders and files.
//!
//! Real filenames and folder structure exist only here. On disk the index
//! is a single blob encrypted under the vault key; the data blobs next to
//! it are named by opaque identifiers and reveal nothing.
//!
//! The tree is strictly parent-to-children; no child holds a back
//! reference. Path resolution walks from the root, and removal collects
//! unreferenced file identifiers in one depth-first pass. An auxiliary
//! map gives O(1) lookup from [`FileId`] to the node's path.

use std::collections::HashMap;
use std::fs;

use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;
use tracing::debug;
use zeroize::Zeroizing;

use crate::crypto::kdf::SALT_SIZE;
use crate::crypto::{blob, derive_master_key, derive_vault_key, VaultKey};
use crate::error::{Error, Result};
use crate::hash::ContentHash;
use crate::io::atomic_write;
use crate::vault::layout::{FileId, VaultLayout};

/// Version of the index plaintext document. Bumping it is the hook for
/// re-parameterizing the KDF or the blob format later.
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// A node in the index tree: a folder with ordered children, or a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    Folder(FolderNode),
    File(FileNode),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Folder(f) => &f.name,
            Node::File(f) => &f.name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderNode {
    pub name: String,
    /// Insertion order is preserved through serialization.
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    pub id: FileId,
    /// Hash of the plaintext last encrypted into this entry's blob.
    pub content_hash: ContentHash,
}

/// A resolved entry. Distinct from [`Node`] because the root folder is
/// addressable (by the empty path) but is not anybody's child.
#[derive(Debug)]
pub enum Entry<'a> {
    Folder(&'a FolderNode),
    File(&'a FileNode),
}

/// Plaintext of `index.enc`. The salt is embedded so the vault remains
/// unlockable even if the `.vault_id` sidecar's directory is recovered
/// from a backup that dropped unknown dotfiles; the copy in the (GCM-
/// authenticated) blob header is what `load` bootstraps from, and the
/// two must agree.
#[serde_as]
#[derive(Serialize, Deserialize)]
struct IndexDocument {
    version: u32,
    #[serde_as(as = "Base64")]
    salt: Vec<u8>,
    tree: FolderNode,
}

/// The in-memory index for one vault.
#[derive(Debug)]
pub struct Index {
    root: FolderNode,
    by_id: HashMap<FileId, String>,
}

impl Index {
    /// Empty index. The root folder carries the vault's display name;
    /// paths never include it.
    pub fn new(vault_name: &str) -> Self {
        Index {
            root: FolderNode {
                name: vault_name.to_string(),
                children: Vec::new(),
            },
            by_id: HashMap::new(),
        }
    }

    pub fn root(&self) -> &FolderNode {
        &self.root
    }

    pub fn file_count(&self) -> usize {
        self.by_id.len()
    }

    pub fn contains_id(&self, id: &FileId) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn path_of(&self, id: &FileId) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }

    /// Resolve a forward-slash relative path. The empty path is the root.
    /// Names compare byte-exactly; there is no case folding.
    pub fn find_by_path(&self, path: &str) -> Option<Entry<'_>> {
        let mut components = match split_path(path) {
            Ok(c) => c,
            Err(_) => return None,
        };
        let last = match components.pop() {
            Some(last) => last,
            None => return Some(Entry::Folder(&self.root)),
        };
        let mut folder = &self.root;
        for part in components {
            folder = match child_of(folder, part) {
                Some(Node::Folder(f)) => f,
                _ => return None,
            };
        }
        match child_of(folder, last)? {
            Node::Folder(f) => Some(Entry::Folder(f)),
            Node::File(f) => Some(Entry::File(f)),
        }
    }

    /// Add an empty folder under `parent_path`.
    pub fn add_folder(&mut self, parent_path: &str, name: &str) -> Result<()> {
        validate_name(name)?;
        let folder = self.folder_mut(parent_path)?;
        if folder.children.iter().any(|c| c.name() == name) {
            return Err(Error::Exists(joined(parent_path, name)));
        }
        folder.children.push(Node::Folder(FolderNode {
            name: name.to_string(),
            children: Vec::new(),
        }));
        Ok(())
    }

    /// Add a file node under `parent_path`.
    pub fn add_file(
        &mut self,
        parent_path: &str,
        name: &str,
        id: FileId,
        content_hash: ContentHash,
    ) -> Result<()> {
        validate_name(name)?;
        if self.by_id.contains_key(&id) {
            return Err(Error::InvalidInput(format!(
                "file identifier already in use: {id}"
            )));
        }
        let folder = self.folder_mut(parent_path)?;
        if folder.children.iter().any(|c| c.name() == name) {
            return Err(Error::Exists(joined(parent_path, name)));
        }
        folder.children.push(Node::File(FileNode {
            name: name.to_string(),
            id,
            content_hash,
        }));
        self.by_id.insert(id, joined(parent_path, name));
        Ok(())
    }

    /// Create any missing folders along `dir_path` ("a/b/c" creates a,
    /// a/b and a/b/c as needed). An existing file in the way is an error.
    pub fn ensure_folders(&mut self, dir_path: &str) -> Result<()> {
        if dir_path.is_empty() {
            return Ok(());
        }
        let mut done = String::new();
        for part in split_path(dir_path)? {
            let parent = done.clone();
            match self.find_by_path(&joined(&parent, part)) {
                Some(Entry::Folder(_)) => {}
                Some(Entry::File(_)) => {
                    return Err(Error::Exists(joined(&parent, part)));
                }
                None => self.add_folder(&parent, part)?,
            }
            done = joined(&parent, part);
        }
        Ok(())
    }

    /// Remove the node at `path`. For a folder, every descendant goes
    /// with it. Returns the file identifiers that became unreferenced;
    /// the caller owns deleting their ciphertext blobs.
    pub fn remove(&mut self, path: &str) -> Result<Vec<FileId>> {
        let mut components = split_path(path)?;
        let name = components
            .pop()
            .ok_or_else(|| Error::InvalidInput("cannot remove the root".to_string()))?;

        let folder = self.folder_mut(&components.join("/"))?;
        let pos = folder
            .children
            .iter()
            .position(|c| c.name() == name)
            .ok_or_else(|| Error::InvalidInput(format!("no such entry: {path}")))?;
        let removed = folder.children.remove(pos);

        let mut orphaned = Vec::new();
        collect_file_ids(&removed, &mut orphaned);
        for id in &orphaned {
            self.by_id.remove(id);
        }
        Ok(orphaned)
    }

    /// Rename the node at `path`. Tree-only: a file keeps its identifier,
    /// so its ciphertext blob on disk is untouched.
    pub fn rename(&mut self, path: &str, new_name: &str) -> Result<()> {
        validate_name(new_name)?;
        let mut components = split_path(path)?;
        let old_name = components
            .pop()
            .ok_or_else(|| Error::InvalidInput("cannot rename the root".to_string()))?;
        let parent_path = components.join("/");

        let folder = self.folder_mut(&parent_path)?;
        if folder
            .children
            .iter()
            .any(|c| c.name() == new_name && c.name() != old_name)
        {
            return Err(Error::Exists(joined(&parent_path, new_name)));
        }
        let child = folder
            .children
            .iter_mut()
            .find(|c| c.name() == old_name)
            .ok_or_else(|| Error::InvalidInput(format!("no such entry: {path}")))?;
        match child {
            Node::Folder(f) => f.name = new_name.to_string(),
            Node::File(f) => f.name = new_name.to_string(),
        }
        // Descendant paths changed.
        self.rebuild_id_map();
        Ok(())
    }

    /// Move or rename a file node to a new path, creating missing
    /// ancestor folders. The identifier (and thus the ciphertext blob on
    /// disk) is unchanged.
    pub fn move_file(&mut self, from: &str, to: &str) -> Result<()> {
        let id = match self.find_by_path(from) {
            Some(Entry::File(f)) => f.id,
            _ => return Err(Error::InvalidInput(format!("no such file: {from}"))),
        };
        if self.find_by_path(to).is_some() {
            return Err(Error::Exists(to.to_string()));
        }

        let mut to_components = split_path(to)?;
        let to_name = to_components
            .pop()
            .ok_or_else(|| Error::InvalidInput("destination cannot be the root".to_string()))?
            .to_string();
        let to_parent = to_components.join("/");
        self.ensure_folders(&to_parent)?;

        // Detach from the old parent.
        let mut from_components = split_path(from)?;
        let from_name = from_components
            .pop()
            .ok_or_else(|| Error::InvalidInput("cannot move the root".to_string()))?;
        let folder = self.folder_mut(&from_components.join("/"))?;
        let pos = folder
            .children
            .iter()
            .position(|c| c.name() == from_name)
            .ok_or_else(|| Error::InvalidInput(format!("no such entry: {from}")))?;
        let mut node = folder.children.remove(pos);
        if let Node::File(f) = &mut node {
            f.name = to_name;
        }

        let target = self.folder_mut(&to_parent)?;
        target.children.push(node);
        self.by_id.insert(id, to.to_string());
        Ok(())
    }

    /// Update the recorded content hash of the file at `path`.
    pub fn set_content_hash(&mut self, path: &str, hash: ContentHash) -> Result<()> {
        let mut components = split_path(path)?;
        let name = components
            .pop()
            .ok_or_else(|| Error::InvalidInput("root is not a file".to_string()))?;
        let folder = self.folder_mut(&components.join("/"))?;
        match folder.children.iter_mut().find(|c| c.name() == name) {
            Some(Node::File(f)) => {
                f.content_hash = hash;
                Ok(())
            }
            _ => Err(Error::InvalidInput(format!("no such file: {path}"))),
        }
    }

    /// All file entries as `(posix_path, node)`, depth-first in child
    /// order.
    pub fn files(&self) -> Vec<(String, &FileNode)> {
        let mut out = Vec::new();
        walk_files(&self.root, "", &mut out);
        out
    }

    fn folder_mut(&mut self, path: &str) -> Result<&mut FolderNode> {
        let mut folder = &mut self.root;
        for part in split_path(path)? {
            let child = folder
                .children
                .iter_mut()
                .find(|c| c.name() == part)
                .ok_or_else(|| Error::InvalidInput(format!("no such folder: {path}")))?;
            folder = match child {
                Node::Folder(f) => f,
                Node::File(_) => {
                    return Err(Error::InvalidInput(format!("not a folder: {path}")))
                }
            };
        }
        Ok(folder)
    }

    fn rebuild_id_map(&mut self) {
        let mut map = HashMap::new();
        let mut files = Vec::new();
        walk_files(&self.root, "", &mut files);
        for (path, node) in files {
            map.insert(node.id, path);
        }
        self.by_id = map;
    }

    /// Serialize, encrypt under the vault key, and atomically write
    /// `index.enc`. The salt rides both in the plaintext document and in
    /// the blob header (see [`IndexDocument`]).
    pub fn save(
        &self,
        layout: &VaultLayout,
        vault_key: &VaultKey,
        salt: &[u8; SALT_SIZE],
    ) -> Result<()> {
        let doc = IndexDocument {
            version: INDEX_FORMAT_VERSION,
            salt: salt.to_vec(),
            tree: self.root.clone(),
        };
        let plaintext = Zeroizing::new(
            serde_json::to_vec(&doc)
                .map_err(|e| Error::InvalidInput(format!("index serialization failed: {e}")))?,
        );
        let sealed = blob::seal(vault_key.secret(), &plaintext, Some(salt))?;
        atomic_write(&layout.index_path(), &sealed)?;
        debug!(files = self.file_count(), "index saved");
        Ok(())
    }

    /// Load and decrypt `index.enc` from a password.
    ///
    /// The salt comes from the blob header (unauthenticated at that
    /// point), drives Argon2id and the HKDF chain, and is then checked
    /// against the authenticated copy inside the plaintext. Every failure
    /// past reading the file (bad header, failed tag, version or salt
    /// mismatch, unparsable plaintext) surfaces as
    /// [`Error::InvalidPassword`]; a wrong password and a corrupted index
    /// are indistinguishable by design.
    pub fn load(layout: &VaultLayout, password: &str) -> Result<(Index, VaultKey, [u8; SALT_SIZE])> {
        if password.is_empty() {
            return Err(Error::InvalidInput("password cannot be empty".to_string()));
        }
        let vault_id = layout.read_vault_id()?;
        let data = fs::read(layout.index_path())?;

        let salt_vec = blob::peek_header_salt(&data)
            .map_err(|_| Error::InvalidPassword)?
            .ok_or(Error::InvalidPassword)?;
        let salt: [u8; SALT_SIZE] =
            salt_vec.try_into().map_err(|_| Error::InvalidPassword)?;

        let master = derive_master_key(password, &salt).map_err(|_| Error::InvalidPassword)?;
        let vault_key = derive_vault_key(&master, vault_id.as_bytes());

        let plaintext =
            blob::open(vault_key.secret(), &data).map_err(|_| Error::InvalidPassword)?;
        let doc: IndexDocument =
            serde_json::from_slice(&plaintext).map_err(|_| Error::InvalidPassword)?;
        if doc.version != INDEX_FORMAT_VERSION || doc.salt != salt {
            return Err(Error::InvalidPassword);
        }

        let mut index = Index {
            root: doc.tree,
            by_id: HashMap::new(),
        };
        index.rebuild_id_map();

        // Duplicate identifiers in the tree would have collided in the
        // map; that is corruption, not a loadable index.
        let mut flat = Vec::new();
        walk_files(&index.root, "", &mut flat);
        if flat.len() != index.by_id.len() {
            return Err(Error::InvalidPassword);
        }

        debug!(files = index.file_count(), "index loaded");
        Ok((index, vault_key, salt))
    }
}

fn child_of<'a>(folder: &'a FolderNode, name: &str) -> Option<&'a Node> {
    folder.children.iter().find(|c| c.name() == name)
}

fn walk_files<'a>(folder: &'a FolderNode, prefix: &str, out: &mut Vec<(String, &'a FileNode)>) {
    for child in &folder.children {
        match child {
            Node::File(f) => out.push((joined(prefix, &f.name), f)),
            Node::Folder(f) => walk_files(f, &joined(prefix, &f.name), out),
        }
    }
}

fn collect_file_ids(node: &Node, out: &mut Vec<FileId>) {
    match node {
        Node::File(f) => out.push(f.id),
        Node::Folder(f) => {
            for child in &f.children {
                collect_file_ids(child, out);
            }
        }
    }
}

fn split_path(path: &str) -> Result<Vec<&str>> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let parts: Vec<&str> = path.split('/').collect();
    if parts.iter().any(|p| p.is_empty() || *p == "." || *p == "..") {
        return Err(Error::InvalidInput(format!("malformed path: {path:?}")));
    }
    Ok(parts)
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(Error::InvalidInput(format!("invalid entry name: {name:?}")));
    }
    Ok(())
}

fn joined(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}
