//! Atomic file writes.
//!
//! Write to a same-directory temp file, fsync, rename over the target,
//! fsync the directory. A reader never observes a partially written
//! target; a crash leaves either the old content or the new content.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use rand::{rngs::OsRng, RngCore};
use tracing::debug;

/// Atomically replace `target` with `data`.
///
/// The temp file (`<target>.tmp-<hex>`) lives in the target's directory so
/// the final rename never crosses a filesystem boundary. On any failure
/// before the rename, the temp file is removed and the target is
/// untouched.
pub fn atomic_write(target: &Path, data: &[u8]) -> io::Result<()> {
    let dir = target.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("target has no parent directory: {}", target.display()),
        )
    })?;
    fs::create_dir_all(dir)?;

    let mut suffix = [0u8; 4];
    OsRng.fill_bytes(&mut suffix);
    let file_name = target
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target has no file name"))?;
    let tmp = dir.join(format!(
        "{}.tmp-{}",
        file_name.to_string_lossy(),
        hex::encode(suffix)
    ));

    let result = write_then_rename(&tmp, target, dir, data);
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn write_then_rename(tmp: &Path, target: &Path, dir: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = File::create(tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(tmp, target)?;
    sync_dir(dir);
    debug!(target_path = %target.display(), bytes = data.len(), "atomic write complete");
    Ok(())
}

/// Persist the rename itself. Directory fsync is a no-op on platforms
/// that do not support opening directories (Windows).
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_new_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out.enc");
        atomic_write(&target, b"payload").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"payload");
    }

    #[test]
    fn replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out.enc");
        fs::write(&target, b"old").unwrap();
        atomic_write(&target, b"new").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"new");
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a/b/out.enc");
        atomic_write(&target, b"deep").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"deep");
    }

    #[test]
    fn leaves_no_temp_files_behind() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out.enc");
        atomic_write(&target, b"payload").unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["out.enc"]);
    }
}
