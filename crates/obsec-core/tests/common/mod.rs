//! Shared harness for integration tests.
#![allow(dead_code)]

use std::path::PathBuf;

use obsec_core::session::SessionConfig;
use tempfile::TempDir;

pub const PASSWORD: &str = "correct horse battery staple";

/// One temp directory holding both a vault location and a private
/// workspace base, so tests never touch the real platform data dir.
pub struct TestEnv {
    /// Held so the temp directory outlives the test body.
    pub _tmp: TempDir,
    pub vault_dir: PathBuf,
    pub config: SessionConfig,
}

pub fn test_env() -> TestEnv {
    let tmp = TempDir::new().expect("temp dir");
    let vault_dir = tmp.path().join("v");
    let config = SessionConfig {
        workspace_base: tmp.path().join("workspace-base"),
        ..SessionConfig::default()
    };
    TestEnv {
        _tmp: tmp,
        vault_dir,
        config,
    }
}

/// Progress callbacks must report a monotonically increasing `done` that
/// ends at `total`.
pub fn assert_monotonic(updates: &[(usize, usize)]) {
    assert!(!updates.is_empty(), "no progress reported");
    let total = updates[0].1;
    let mut last = 0;
    for &(done, t) in updates {
        assert_eq!(t, total, "total changed mid-operation");
        assert!(done >= last, "progress went backwards: {done} < {last}");
        last = done;
    }
    assert_eq!(last, total, "progress did not reach total");
}
