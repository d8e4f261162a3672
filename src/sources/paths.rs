use anyhow::Result;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::SyncError;

#[derive(Debug, Clone)]
pub struct SourcePaths {
    pub home: PathBuf,
    pub default_sources: PathBuf,
    pub custom_sources: PathBuf,
    pub templates_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl SourcePaths {
    /// Installed snapshot directory for `alias`. Callers validate the alias first.
    pub fn install_dir(&self, alias: &str) -> PathBuf {
        self.templates_dir.join(alias)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.state_dir.join("tmplsync.lock")
    }

    pub fn stop_file(&self) -> PathBuf {
        self.state_dir.join("update.stop")
    }

    pub fn audit_log(&self) -> PathBuf {
        self.logs_dir.join("audit.log")
    }

    pub fn under(home: &Path) -> Self {
        let etc = home.join("etc");
        Self {
            home: home.to_path_buf(),
            default_sources: etc.join("default-sources.yaml"),
            custom_sources: etc.join("custom-sources.yaml"),
            templates_dir: home.join("templates"),
            logs_dir: home.join("logs"),
            state_dir: home.join("state"),
        }
    }
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<SourcePaths> {
    let home = match env::var("TMPLSYNC_HOME") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => required_home_dir()?.join(".tmplsync"),
    };
    let base = SourcePaths::under(&home);

    Ok(SourcePaths {
        default_sources: env_or_default_path("TMPLSYNC_DEFAULT_SOURCES", base.default_sources),
        custom_sources: env_or_default_path("TMPLSYNC_CUSTOM_SOURCES", base.custom_sources),
        templates_dir: env_or_default_path("TMPLSYNC_TEMPLATES_DIR", base.templates_dir),
        logs_dir: env_or_default_path("TMPLSYNC_LOGS_DIR", base.logs_dir),
        state_dir: env_or_default_path("TMPLSYNC_STATE_DIR", base.state_dir),
        home,
    })
}

/// Aliases become a single directory name under the templates dir, so they
/// are restricted to a conservative character set.
pub fn validate_alias(alias: &str) -> Result<(), SyncError> {
    let invalid = |reason: &str| SyncError::InvalidAlias {
        alias: alias.to_string(),
        reason: reason.to_string(),
    };

    if alias.is_empty() {
        return Err(invalid("alias cannot be empty"));
    }
    if alias.eq_ignore_ascii_case("all") {
        return Err(invalid("`all` is reserved"));
    }
    if alias.starts_with('.') {
        return Err(invalid("alias cannot start with `.`"));
    }
    if !alias
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
    {
        return Err(invalid("use ASCII letters, digits, `-`, `_` or `.`"));
    }
    Ok(())
}
