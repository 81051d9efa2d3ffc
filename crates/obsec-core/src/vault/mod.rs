//! Vault-level abstractions: on-disk layout, the encrypted index, and
//! vault lifecycle operations.

pub mod index;
pub mod layout;
pub mod manager;

pub use index::{Entry, FileNode, FolderNode, Index, Node, INDEX_FORMAT_VERSION};
pub use layout::{FileId, VaultId, VaultLayout, BLOB_EXTENSION, INDEX_FILE, VAULT_ID_FILE};
pub use manager::{create, discover_vaults, open, orphan_blobs, VaultHandle};
