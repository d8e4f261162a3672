//! Snapshot extraction.
//!
//! Forge archives wrap every file in a single `<name>-<revision>/` folder.
//! Entries are rewritten relative to that folder and written as plain files;
//! anything that would land outside the destination aborts the whole unpack.

use flate2::read::GzDecoder;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::error::SyncError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnpackStats {
    pub files: usize,
    pub bytes: u64,
    pub skipped_links: usize,
}

fn extraction_failure(dest: &Path, reason: impl Into<String>) -> SyncError {
    SyncError::ExtractionFailure {
        path: dest.to_path_buf(),
        reason: reason.into(),
    }
}

/// Rewrites a raw archive path relative to the wrapper folder.
///
/// Both `/` and `\` separate segments and the wrapper folder is matched
/// ignoring ASCII case. Returns `Ok(None)` for the wrapper folder itself.
pub fn strip_wrapper(raw: &str, prefix: &str) -> Result<Option<PathBuf>, String> {
    let unified = raw.replace('\\', "/");
    if unified.starts_with('/') {
        return Err(format!("absolute entry path `{raw}`"));
    }

    let segments: Vec<&str> = unified
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect();
    if segments.iter().any(|seg| *seg == "..") {
        return Err(format!("entry `{raw}` escapes the destination"));
    }
    if segments.first().is_some_and(|seg| seg.contains(':')) {
        return Err(format!("entry `{raw}` carries a drive prefix"));
    }

    match segments.split_first() {
        None => Ok(None),
        Some((first, _)) if !first.eq_ignore_ascii_case(prefix) => {
            Err(format!("entry `{raw}` is outside wrapper folder `{prefix}/`"))
        }
        Some((_, [])) => Ok(None),
        Some((_, rest)) => Ok(Some(rest.iter().collect())),
    }
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if mode & 0o111 != 0 {
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(perms.mode() | 0o755);
        fs::set_permissions(path, perms)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Replaces `dest` with the contents of a gzip'd tar stream.
///
/// `dest` is removed entirely and recreated empty before any entry is
/// written. Only regular files are materialised; links are skipped.
pub fn unpack<R: Read>(archive: R, dest: &Path, prefix: &str) -> Result<UnpackStats, SyncError> {
    if dest.exists() {
        fs::remove_dir_all(dest)
            .map_err(|err| extraction_failure(dest, format!("failed to clear: {err}")))?;
    }
    fs::create_dir_all(dest)
        .map_err(|err| extraction_failure(dest, format!("failed to create: {err}")))?;

    let mut tar = tar::Archive::new(GzDecoder::new(archive));
    let entries = tar
        .entries()
        .map_err(|err| extraction_failure(dest, format!("corrupt archive: {err}")))?;

    let mut stats = UnpackStats::default();
    for entry in entries {
        let mut entry =
            entry.map_err(|err| extraction_failure(dest, format!("corrupt archive: {err}")))?;
        let kind = entry.header().entry_type();
        if kind.is_dir() || kind.is_pax_global_extensions() {
            continue;
        }

        let raw_path = entry.path_bytes();
        let raw = std::str::from_utf8(&raw_path)
            .map_err(|_| extraction_failure(dest, "entry path is not valid UTF-8"))?
            .to_string();
        let relative =
            strip_wrapper(&raw, prefix).map_err(|reason| extraction_failure(dest, reason))?;
        let Some(relative) = relative else {
            continue;
        };

        if kind.is_symlink() || kind.is_hard_link() {
            tracing::warn!(entry = %raw, "skipping link entry in snapshot archive");
            stats.skipped_links += 1;
            continue;
        }
        if !kind.is_file() {
            tracing::debug!(entry = %raw, ?kind, "skipping non-file entry");
            continue;
        }

        let target = dest.join(&relative);
        if !target.starts_with(dest) {
            return Err(extraction_failure(dest, format!("entry `{raw}` escapes the destination")));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                extraction_failure(dest, format!("failed to create {}: {err}", parent.display()))
            })?;
        }

        let mode = entry.header().mode().unwrap_or(0o644);
        let mut file = fs::File::create(&target).map_err(|err| {
            extraction_failure(dest, format!("failed to create {}: {err}", target.display()))
        })?;
        let written = io::copy(&mut entry, &mut file)
            .map_err(|err| extraction_failure(dest, format!("corrupt archive at `{raw}`: {err}")))?;
        drop(file);
        apply_mode(&target, mode).map_err(|err| {
            extraction_failure(dest, format!("failed to set mode on {}: {err}", target.display()))
        })?;

        stats.files += 1;
        stats.bytes += written;
    }

    Ok(stats)
}

/// Moves a fully prepared tree at `staged` into `live`.
///
/// The current live tree is parked at `trash` first and only deleted after
/// the new tree is in place; if the final rename fails it is restored.
pub fn replace_tree(staged: &Path, live: &Path, trash: &Path) -> Result<(), SyncError> {
    if let Some(parent) = live.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| extraction_failure(live, format!("failed to create parent: {err}")))?;
    }

    let parked = if live.exists() {
        if trash.exists() {
            fs::remove_dir_all(trash).map_err(|err| {
                extraction_failure(live, format!("failed to clear {}: {err}", trash.display()))
            })?;
        }
        fs::rename(live, trash).map_err(|err| {
            extraction_failure(live, format!("failed to move old tree aside: {err}"))
        })?;
        true
    } else {
        false
    };

    if let Err(err) = fs::rename(staged, live) {
        if parked && let Err(restore_err) = fs::rename(trash, live) {
            tracing::error!(
                live = %live.display(),
                error = %restore_err,
                "failed to restore previous tree"
            );
        }
        return Err(extraction_failure(live, format!("failed to move new tree into place: {err}")));
    }

    if parked && let Err(err) = fs::remove_dir_all(trash) {
        tracing::warn!(path = %trash.display(), error = %err, "failed to delete previous tree");
    }
    Ok(())
}
