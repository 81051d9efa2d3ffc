//! Best-effort secure deletion.
//!
//! Files are overwritten across their full length three times (random,
//! random, zeros) with an fsync between passes, then unlinked. This
//! defeats casual recovery of the plaintext from a conventional disk; it
//! is documented as ineffective against wear-leveled media and
//! copy-on-write filesystems, which may retain prior sector contents.

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use rand::{rngs::OsRng, RngCore};
use tracing::{debug, warn};

use crate::error::{Error, Result};

const OVERWRITE_CHUNK: usize = 64 * 1024;

/// Overwrite and unlink a single file. Missing files are not an error.
pub fn secure_delete_file(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => {
            return Err(Error::InvalidInput(format!(
                "not a regular file: {}",
                path.display()
            )))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    }

    overwrite(path)?;
    fs::remove_file(path)?;
    debug!(path = %path.display(), "securely deleted file");
    Ok(())
}

/// Recursively secure-delete every file under `dir`, then remove the
/// now-empty directories depth-first.
///
/// If any file cannot be overwritten or unlinked (typically held open by
/// another process), the failure is collected and the whole operation
/// fails with [`Error::ResourceBusy`] naming the offending paths. No
/// directory is removed in that case: from the caller's viewpoint the
/// tree is still there, and retrying after closing the other process is
/// just another secure delete.
pub fn secure_delete_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    if !dir.is_dir() {
        return Err(Error::InvalidInput(format!(
            "not a directory: {}",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    let mut subdirs = Vec::new();
    collect(dir, &mut files, &mut subdirs)?;

    let mut busy = Vec::new();
    for file in &files {
        if let Err(e) = secure_delete_file(file) {
            warn!(path = %file.display(), error = %e, "could not securely delete");
            busy.push(file.clone());
        }
    }
    if !busy.is_empty() {
        return Err(Error::ResourceBusy(busy));
    }

    // Children were collected before parents; remove in reverse.
    for sub in subdirs.iter().rev() {
        if let Err(e) = fs::remove_dir(sub) {
            warn!(path = %sub.display(), error = %e, "could not remove directory");
            return Err(Error::ResourceBusy(vec![sub.clone()]));
        }
    }
    fs::remove_dir(dir).map_err(|_| Error::ResourceBusy(vec![dir.to_path_buf()]))?;
    debug!(path = %dir.display(), files = files.len(), "securely deleted directory");
    Ok(())
}

fn collect(dir: &Path, files: &mut Vec<PathBuf>, subdirs: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            subdirs.push(path.clone());
            collect(&path, files, subdirs)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

fn overwrite(path: &Path) -> Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    let len = file.metadata()?.len();

    for pass in 0..3u8 {
        file.seek(SeekFrom::Start(0))?;
        let mut remaining = len;
        let mut chunk = vec![0u8; OVERWRITE_CHUNK];
        while remaining > 0 {
            let n = remaining.min(OVERWRITE_CHUNK as u64) as usize;
            if pass < 2 {
                OsRng.fill_bytes(&mut chunk[..n]);
            } else {
                chunk[..n].fill(0);
            }
            file.write_all(&chunk[..n])?;
            remaining -= n as u64;
        }
        file.sync_all()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn deletes_single_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secret.md");
        fs::write(&path, b"do not recover me").unwrap();
        secure_delete_file(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn missing_file_is_ok() {
        let dir = TempDir::new().unwrap();
        secure_delete_file(&dir.path().join("absent")).unwrap();
    }

    #[test]
    fn deletes_nested_directory_tree() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("ws");
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("top.md"), b"top").unwrap();
        fs::write(root.join("a/mid.md"), b"mid").unwrap();
        fs::write(root.join("a/b/deep.md"), b"deep").unwrap();

        secure_delete_dir(&root).unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn empty_directory_is_removed() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("empty");
        fs::create_dir(&root).unwrap();
        secure_delete_dir(&root).unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn overwrite_zeroes_last_pass() {
        // The final pass writes zeros, so a file kept open through the
        // overwrite (but before unlink) reads back as zeros.
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("observed.md");
        fs::write(&path, b"sensitive").unwrap();
        overwrite(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), vec![0u8; 9]);
        fs::remove_file(&path).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_reports_resource_busy() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let root = dir.path().join("ws");
        fs::create_dir(&root).unwrap();
        let locked = root.join("locked.md");
        fs::write(&locked, b"held").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Root bypasses permission bits; nothing to observe in that case.
        if OpenOptions::new().write(true).open(&locked).is_ok() {
            return;
        }

        let err = secure_delete_dir(&root).unwrap_err();
        match &err {
            Error::ResourceBusy(paths) => assert_eq!(paths, &vec![locked.clone()]),
            other => panic!("expected ResourceBusy, got {other:?}"),
        }
        // The directory must still be there for a retry.
        assert!(root.exists());

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o600)).unwrap();
        secure_delete_dir(&root).unwrap();
        assert!(!root.exists());
    }
}
