//! Session management: the plaintext workspace and the unlock/lock
//! reconciliation protocol.

pub mod manager;
pub mod workspace;

use std::path::PathBuf;

pub use manager::{Session, SessionState};
pub use workspace::{clean_leftover_workspaces, list_leftover_workspaces, Workspace};

/// Directory name under the platform's per-user local data directory.
pub const APP_DIR_NAME: &str = "ObsidianSecure";

/// Prefix for workspace directories; leftover-workspace discovery scans
/// for it at startup.
pub const WORKSPACE_PREFIX: &str = "workspace_";

/// Configuration for sessions. All fields have working defaults; a shell
/// overrides what it needs (tests point `workspace_base` at a temp dir).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Where workspaces are materialized.
    pub workspace_base: PathBuf,
    /// Workspace-relative POSIX path prefixes excluded from the lock
    /// scan. Empty by default: editor configuration directories are
    /// ordinary files and get persisted like everything else.
    pub ignored_paths: Vec<String>,
    /// External editor executable for [`Session::launch_editor`].
    pub editor: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            workspace_base: default_workspace_base(),
            ignored_paths: Vec::new(),
            editor: None,
        }
    }
}

fn default_workspace_base() -> PathBuf {
    match directories::BaseDirs::new() {
        Some(dirs) => dirs.data_local_dir().join(APP_DIR_NAME),
        None => std::env::temp_dir().join(APP_DIR_NAME),
    }
}
