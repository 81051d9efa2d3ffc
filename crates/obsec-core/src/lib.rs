//! Cryptographic core and vault-state engine for ObsidianSecure.
//!
//! Encrypts a directory of notes into an opaque, content- and
//! metadata-protected vault, and reconstructs a plaintext working copy
//! for the duration of a session:
//!
//! - password-based key derivation (Argon2id) and a three-level key
//!   hierarchy (master → vault → per-file, via HKDF-SHA256);
//! - an authenticated blob format (AES-256-GCM with the header bound as
//!   associated data);
//! - an encrypted index that hides real filenames and folder structure;
//! - atomic writes and best-effort secure deletion;
//! - the unlock/edit/lock session protocol that reconciles a mutable
//!   plaintext workspace back into the vault without loss.
//!
//! The graphical shell, the external editor and the filesystem watcher
//! are collaborators, not part of this crate; see [`session::Session`]
//! for the surface they talk to.

#![forbid(unsafe_code)]

pub mod crypto;
pub mod error;
pub mod hash;
pub mod io;
pub mod session;
pub mod vault;

pub use error::{Error, Result};
