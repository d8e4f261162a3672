use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::SyncError;

pub const METADATA_FILE: &str = ".tmplsync-source.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledSnapshotMetadata {
    pub source: String,
    pub sha: String,
}

pub fn metadata_path(install_dir: &Path) -> PathBuf {
    install_dir.join(METADATA_FILE)
}

/// Absent metadata means "never installed". Unreadable or malformed metadata
/// is logged and treated the same, which forces a reinstall.
pub fn read_installed(install_dir: &Path) -> Option<InstalledSnapshotMetadata> {
    let path = metadata_path(install_dir);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return None,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "installed metadata unreadable; treating as not installed"
            );
            return None;
        }
    };

    match serde_yaml::from_str::<InstalledSnapshotMetadata>(&raw) {
        Ok(meta) if !meta.sha.trim().is_empty() => Some(meta),
        Ok(_) => {
            tracing::warn!(
                path = %path.display(),
                "installed metadata has empty sha; treating as not installed"
            );
            None
        }
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "installed metadata malformed; treating as not installed"
            );
            None
        }
    }
}

/// Call only once a snapshot has been completely unpacked into `install_dir`.
pub fn write_installed(
    install_dir: &Path,
    metadata: &InstalledSnapshotMetadata,
) -> Result<PathBuf, SyncError> {
    let path = metadata_path(install_dir);
    let body = serde_yaml::to_string(metadata).map_err(|err| SyncError::WriteFailure {
        path: path.clone(),
        reason: err.to_string(),
    })?;
    fs::write(&path, body).map_err(|err| SyncError::WriteFailure {
        path: path.clone(),
        reason: err.to_string(),
    })?;
    Ok(path)
}

pub fn needs_update(
    installed: Option<&InstalledSnapshotMetadata>,
    repo_url: &str,
    target_revision: &str,
) -> bool {
    match installed {
        None => true,
        Some(meta) => meta.sha != target_revision || meta.source != repo_url,
    }
}
