use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::sources::paths::SourcePaths;

pub const LATEST: &str = "latest";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub alias: String,
    pub repo: String,
    pub sha: String,
}

impl SourceRecord {
    pub fn new(alias: impl Into<String>, repo: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            repo: repo.into(),
            sha: sha.into(),
        }
    }

    pub fn revision_spec(&self) -> RevisionSpec<'_> {
        let sha = self.sha.trim();
        if sha.is_empty() || sha.eq_ignore_ascii_case(LATEST) {
            RevisionSpec::Latest
        } else {
            RevisionSpec::Pinned(sha)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionSpec<'a> {
    Latest,
    Pinned(&'a str),
}

/// On-disk shape; tolerant of hand-edited documents.
#[derive(Debug, Deserialize)]
struct RawRecord {
    alias: Option<String>,
    repo: Option<String>,
    sha: Option<serde_yaml::Value>,
}

/// Only strings count as revisions. Unquoted values such as `1e5` or
/// `1234567` would be read back as numbers and lose their spelling.
fn revision_text(path: &Path, alias: &str, value: serde_yaml::Value) -> Result<String, SyncError> {
    match value {
        serde_yaml::Value::Null => Ok(LATEST.to_string()),
        serde_yaml::Value::String(s) if s.trim().is_empty() => Ok(LATEST.to_string()),
        serde_yaml::Value::String(s) => Ok(s.trim().to_string()),
        _ => Err(malformed(
            path,
            format!("entry `{alias}` has a non-string sha; quote the revision"),
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryList {
    Default,
    Custom,
}

impl RegistryList {
    pub fn label(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Custom => "custom",
        }
    }

    pub fn path(self, paths: &SourcePaths) -> &Path {
        match self {
            Self::Default => &paths.default_sources,
            Self::Custom => &paths.custom_sources,
        }
    }
}

/// Merged alias -> record view, ordered by alias.
pub type SourceMap = BTreeMap<String, SourceRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    Replaced,
}

fn malformed(path: &Path, reason: impl Into<String>) -> SyncError {
    SyncError::MalformedRegistry {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn write_failure(path: &Path, reason: impl ToString) -> SyncError {
    SyncError::WriteFailure {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

pub fn parse_records(path: &Path, raw: &str) -> Result<Vec<SourceRecord>, SyncError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let parsed: Option<Vec<RawRecord>> = serde_yaml::from_str(raw).map_err(|err| {
        let reason = match err.location() {
            Some(mark) => format!("{err} (line {}, column {})", mark.line(), mark.column()),
            None => err.to_string(),
        };
        malformed(path, reason)
    })?;

    let mut out = Vec::new();
    for (idx, entry) in parsed.unwrap_or_default().into_iter().enumerate() {
        let Some(alias) = entry.alias.filter(|a| !a.trim().is_empty()) else {
            tracing::warn!(
                path = %path.display(),
                entry = idx,
                "ignoring registry entry without alias"
            );
            continue;
        };
        let Some(repo) = entry.repo.filter(|r| !r.trim().is_empty()) else {
            return Err(malformed(path, format!("entry `{alias}` has no repo")));
        };
        let alias = alias.trim().to_string();
        let sha = match entry.sha {
            Some(value) => revision_text(path, &alias, value)?,
            None => LATEST.to_string(),
        };
        out.push(SourceRecord {
            alias,
            repo: repo.trim().to_string(),
            sha,
        });
    }
    Ok(out)
}

/// Loads a registry document. A missing file is an empty list.
pub fn load(path: &Path) -> Result<Vec<SourceRecord>, SyncError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(malformed(path, format!("unreadable: {err}"))),
    };
    parse_records(path, &raw)
}

pub fn load_list(paths: &SourcePaths, list: RegistryList) -> Result<Vec<SourceRecord>, SyncError> {
    load(list.path(paths))
}

fn backup_path_for(path: &Path, stamp: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("sources");
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("yaml");
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut candidate = dir.join(format!("{stem}.backup.{stamp}.{ext}"));
    let mut n = 1usize;
    while candidate.exists() {
        candidate = dir.join(format!("{stem}.backup.{stamp}-{n}.{ext}"));
        n += 1;
    }
    candidate
}

/// Copies the current document aside before it is overwritten. Returns the
/// backup location, or `None` when there was nothing to back up.
pub fn backup(path: &Path) -> Result<Option<PathBuf>, SyncError> {
    if !path.exists() {
        return Ok(None);
    }
    let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
    let target = backup_path_for(path, &stamp);
    fs::copy(path, &target).map_err(|err| write_failure(&target, err))?;
    tracing::debug!(backup = %target.display(), "registry backup written");
    Ok(Some(target))
}

fn render(records: &[SourceRecord]) -> Result<String, serde_yaml::Error> {
    if records.is_empty() {
        return Ok(String::new());
    }
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| a.alias.cmp(&b.alias));
    serde_yaml::to_string(&sorted)
}

fn write_document(path: &Path, body: &str) -> Result<(), SyncError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|err| write_failure(dir, err))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|err| write_failure(path, err))?;
    tmp.write_all(body.as_bytes())
        .map_err(|err| write_failure(path, err))?;
    tmp.persist(path).map_err(|err| write_failure(path, err.error))?;
    Ok(())
}

/// Backs up the previous content, then writes `records` sorted by alias.
pub fn save(path: &Path, records: &[SourceRecord]) -> Result<Option<PathBuf>, SyncError> {
    let body = render(records).map_err(|err| write_failure(path, err))?;
    let backup = backup(path)?;
    write_document(path, &body)?;
    Ok(backup)
}

pub fn add_or_replace(path: &Path, record: SourceRecord) -> Result<AddOutcome, SyncError> {
    let mut records = load(path)?;
    let outcome = match records.iter_mut().find(|r| r.alias == record.alias) {
        Some(existing) => {
            *existing = record;
            AddOutcome::Replaced
        }
        None => {
            records.push(record);
            AddOutcome::Added
        }
    };
    save(path, &records)?;
    Ok(outcome)
}

/// Removes one alias. The document is left untouched when the alias is absent.
pub fn remove(path: &Path, alias: &str, origin: &str) -> Result<SourceRecord, SyncError> {
    let mut records = load(path)?;
    let Some(idx) = records.iter().position(|r| r.alias == alias) else {
        return Err(SyncError::AliasNotFound {
            alias: alias.to_string(),
            origin: origin.to_string(),
        });
    };
    let removed = records.remove(idx);
    save(path, &records)?;
    Ok(removed)
}

/// Clears the document. Always succeeds on an absent or empty list.
pub fn remove_all(path: &Path) -> Result<usize, SyncError> {
    let records = load(path)?;
    if records.is_empty() {
        return Ok(0);
    }
    save(path, &[])?;
    Ok(records.len())
}

/// Defaults first, then custom; a custom record replaces a default one wholesale.
pub fn merge_defaults_and_custom(defaults: &[SourceRecord], custom: &[SourceRecord]) -> SourceMap {
    let mut merged = SourceMap::new();
    for record in defaults.iter().chain(custom) {
        merged.insert(record.alias.clone(), record.clone());
    }
    merged
}

pub fn load_merged(paths: &SourcePaths) -> Result<SourceMap, SyncError> {
    let defaults = load_list(paths, RegistryList::Default)?;
    let custom = load_list(paths, RegistryList::Custom)?;
    Ok(merge_defaults_and_custom(&defaults, &custom))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn backups_in(dir: &Path) -> usize {
        fs::read_dir(dir)
            .expect("read dir")
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().contains(".backup."))
            .count()
    }

    #[test]
    fn missing_file_loads_as_empty_list() {
        let tmp = tempdir().expect("tempdir");
        let records = load(&tmp.path().join("nope.yaml")).expect("load");
        assert!(records.is_empty());
    }

    #[test]
    fn empty_and_null_documents_are_empty_lists() {
        let path = Path::new("x.yaml");
        assert!(parse_records(path, "").expect("empty").is_empty());
        assert!(parse_records(path, "  \n").expect("blank").is_empty());
        assert!(parse_records(path, "~\n").expect("null").is_empty());
    }

    #[test]
    fn malformed_yaml_is_reported() {
        let err = parse_records(Path::new("x.yaml"), "- alias: [unterminated\n")
            .expect_err("should fail");
        assert!(matches!(err, SyncError::MalformedRegistry { .. }));
    }

    #[test]
    fn entries_without_alias_are_skipped_and_sha_defaults_to_latest() {
        let raw = "- repo: https://github.com/acme/orphan\n\
                   - alias: demo\n  repo: https://github.com/acme/demo\n";
        let records = parse_records(Path::new("x.yaml"), raw).expect("parse");
        assert_eq!(
            records,
            vec![SourceRecord::new("demo", "https://github.com/acme/demo", "latest")]
        );
    }

    #[test]
    fn save_then_load_preserves_records_sorted_by_alias() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("etc/custom-sources.yaml");
        let records = vec![
            SourceRecord::new("zeta", "https://github.com/acme/zeta", "latest"),
            SourceRecord::new("alpha", "https://github.com/acme/alpha", "abc123"),
        ];

        let backup = save(&path, &records).expect("save");
        assert!(backup.is_none());

        let loaded = load(&path).expect("load");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], records[1]);
        assert_eq!(loaded[1], records[0]);
    }

    #[test]
    fn save_over_existing_file_writes_timestamped_backup() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("custom-sources.yaml");
        save(&path, &[SourceRecord::new("a", "https://github.com/x/a", "latest")]).expect("save");

        let backup = save(&path, &[]).expect("save").expect("backup path");
        let name = backup.file_name().expect("name").to_string_lossy().to_string();
        assert!(name.starts_with("custom-sources.backup."));
        assert!(name.ends_with(".yaml"));
        let stamp = &name["custom-sources.backup.".len().."custom-sources.backup.".len() + 15];
        assert_eq!(stamp.as_bytes()[8], b'-');
        assert!(stamp.chars().filter(|c| c.is_ascii_digit()).count() == 14);

        assert!(fs::read_to_string(&backup).expect("read backup").contains("alias: a"));
        assert_eq!(fs::read_to_string(&path).expect("read"), "");
    }

    #[test]
    fn add_or_replace_replaces_by_alias() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("custom-sources.yaml");

        let first = SourceRecord::new("demo", "https://github.com/acme/demo", "latest");
        let first = add_or_replace(&path, first).expect("add");
        assert_eq!(first, AddOutcome::Added);
        let second = SourceRecord::new("demo", "https://github.com/acme/demo2", "abc");
        let second = add_or_replace(&path, second).expect("replace");
        assert_eq!(second, AddOutcome::Replaced);

        let loaded = load(&path).expect("load");
        assert_eq!(
            loaded,
            vec![SourceRecord::new("demo", "https://github.com/acme/demo2", "abc")]
        );
    }

    #[test]
    fn removing_unknown_alias_leaves_file_untouched() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("custom-sources.yaml");
        save(&path, &[SourceRecord::new("demo", "https://github.com/acme/demo", "latest")])
            .expect("save");
        let before = fs::read(&path).expect("read");

        let err = remove(&path, "ghost", "custom sources").expect_err("should fail");
        assert!(matches!(err, SyncError::AliasNotFound { .. }));
        assert_eq!(fs::read(&path).expect("read"), before);
        assert_eq!(backups_in(tmp.path()), 0);
    }

    #[test]
    fn remove_all_on_empty_list_succeeds_without_backup() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("custom-sources.yaml");
        assert_eq!(remove_all(&path).expect("remove all"), 0);
        assert_eq!(backups_in(tmp.path()), 0);
    }

    #[test]
    fn merge_prefers_custom_records_entirely() {
        let defaults = vec![
            SourceRecord::new("shared", "https://github.com/acme/default", "latest"),
            SourceRecord::new("only-default", "https://github.com/acme/d", "111"),
        ];
        let custom = vec![
            SourceRecord::new("shared", "https://github.com/acme/custom", "222"),
            SourceRecord::new("only-custom", "https://github.com/acme/c", "latest"),
        ];

        let merged = merge_defaults_and_custom(&defaults, &custom);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged["shared"], custom[0]);
        assert_eq!(merged["only-default"], defaults[1]);
        assert_eq!(merged["only-custom"], custom[1]);
    }

    #[test]
    fn unquoted_numeric_revisions_are_malformed() {
        for sha in ["1234567", "1e5", "12345e6", "true"] {
            let raw =
                format!("- alias: demo\n  repo: https://github.com/acme/demo\n  sha: {sha}\n");
            let err = parse_records(Path::new("x.yaml"), &raw).expect_err(sha);
            assert!(matches!(err, SyncError::MalformedRegistry { .. }), "{sha}");
        }
    }

    #[test]
    fn quoted_and_missing_revisions_are_accepted() {
        let raw = "- alias: a\n  repo: https://github.com/acme/a\n  sha: \"1234567\"\n\
                   - alias: b\n  repo: https://github.com/acme/b\n  sha:\n\
                   - alias: c\n  repo: https://github.com/acme/c\n";
        let records = parse_records(Path::new("x.yaml"), raw).expect("parse");
        let shas: Vec<&str> = records.iter().map(|r| r.sha.as_str()).collect();
        assert_eq!(shas, vec!["1234567", "latest", "latest"]);
    }

    #[test]
    fn saved_numeric_looking_revisions_load_back_unchanged() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("custom-sources.yaml");
        save(&path, &[SourceRecord::new("demo", "https://github.com/acme/demo", "1234567")])
            .expect("save");
        assert_eq!(load(&path).expect("load")[0].sha, "1234567");
    }

    #[test]
    fn revision_spec_recognises_latest_sentinel() {
        let latest = SourceRecord::new("a", "u", "latest");
        let pinned = SourceRecord::new("a", "u", "abc123");
        assert_eq!(latest.revision_spec(), RevisionSpec::Latest);
        assert_eq!(pinned.revision_spec(), RevisionSpec::Pinned("abc123"));
    }
}
