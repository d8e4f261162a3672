use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::error::SyncError;

/// Exclusive process lock held for the lifetime of a mutating command.
#[derive(Debug)]
pub struct SyncLock {
    file: File,
}

impl Drop for SyncLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

pub fn acquire(path: &Path) -> Result<SyncLock, SyncError> {
    let write_failure = |err: std::io::Error| SyncError::WriteFailure {
        path: path.to_path_buf(),
        reason: err.to_string(),
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_failure)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)
        .map_err(write_failure)?;

    if file.try_lock_exclusive().is_err() {
        return Err(SyncError::Locked(path.to_path_buf()));
    }

    file.set_len(0).map_err(write_failure)?;
    writeln!(file, "{}", std::process::id()).map_err(write_failure)?;

    Ok(SyncLock { file })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_acquire_fails_until_first_is_dropped() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("state/tmplsync.lock");

        let first = acquire(&path).expect("first lock");
        assert!(matches!(acquire(&path), Err(SyncError::Locked(_))));
        let pid = fs::read_to_string(&path).expect("read lock");
        assert_eq!(pid.trim(), std::process::id().to_string());

        drop(first);
        assert!(acquire(&path).is_ok());
    }
}
