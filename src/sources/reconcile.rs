use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::sources::audit;
use crate::sources::fetch::{ArchiveFetcher, download_archive};
use crate::sources::forge::{Forge, RepoRef};
use crate::sources::installed::{self, InstalledSnapshotMetadata};
use crate::sources::paths::{SourcePaths, validate_alias};
use crate::sources::registry::{self, SourceMap, SourceRecord};
use crate::sources::resolver;
use crate::sources::unpack::{self, UnpackStats};
use crate::sources::warn;

const STAGING_PREFIX: &str = ".tmplsync-staging-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncTarget {
    All,
    Alias(String),
}

impl SyncTarget {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Alias(trimmed.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Resolve,
    Download,
    Unpack,
    Install,
}

impl FailureStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Download => "download",
            Self::Unpack => "unpack",
            Self::Install => "install",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Updated {
        from: Option<String>,
        to: String,
        files: usize,
    },
    UpToDate {
        revision: String,
    },
    SkippedUnsupported {
        reason: String,
    },
    Failed {
        stage: FailureStage,
        error: String,
    },
    Cancelled,
}

impl SourceOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Updated { .. } => "updated",
            Self::UpToDate { .. } => "up-to-date",
            Self::SkippedUnsupported { .. } => "skipped-unsupported",
            Self::Failed { .. } => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// A registry record after its target revision has been resolved and
/// compared with what is installed.
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    pub record: SourceRecord,
    pub repo: RepoRef,
    pub target_revision: String,
    pub installed_revision: Option<String>,
    pub local_path: PathBuf,
    pub needs_update: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub outcomes: BTreeMap<String, SourceOutcome>,
    pub downloads: usize,
}

impl ReconcileReport {
    fn count(&self, pred: impl Fn(&SourceOutcome) -> bool) -> usize {
        self.outcomes.values().filter(|o| pred(o)).count()
    }

    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Updated { .. }))
    }

    pub fn up_to_date(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::UpToDate { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::SkippedUnsupported { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Failed { .. }))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Cancelled))
    }

    /// Nothing was stale and nothing went wrong while checking.
    pub fn no_updates_required(&self) -> bool {
        self.outcomes.values().all(|o| {
            matches!(
                o,
                SourceOutcome::UpToDate { .. } | SourceOutcome::SkippedUnsupported { .. }
            )
        })
    }
}

/// Cooperative cancellation, checked between aliases while applying updates.
/// A run is cancelled once its stop file appears.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    stop_file: Option<PathBuf>,
}

impl CancelToken {
    pub fn with_stop_file(path: PathBuf) -> Self {
        Self {
            stop_file: Some(path),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.stop_file.as_deref().is_some_and(Path::exists)
    }

    /// Drops a stop request left behind by an earlier run.
    pub fn clear_stale(&self) {
        if let Some(path) = &self.stop_file
            && path.exists()
        {
            if let Err(err) = fs::remove_file(path) {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to clear stale stop request"
                );
            }
        }
    }
}

pub struct Reconciler<'a> {
    pub paths: &'a SourcePaths,
    pub forge: &'a dyn Forge,
    pub fetcher: &'a dyn ArchiveFetcher,
    pub cancel: CancelToken,
}

/// Removes staging dirs left behind by a run that never reached cleanup.
fn sweep_stale_staging(templates_dir: &Path) {
    let Ok(entries) = fs::read_dir(templates_dir) else {
        return;
    };
    for entry in entries.filter_map(Result::ok) {
        if !entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
            continue;
        }
        let path = entry.path();
        match fs::remove_dir_all(&path) {
            Ok(()) => tracing::info!(path = %path.display(), "removed stale staging dir"),
            Err(err) => tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to remove stale staging dir"
            ),
        }
    }
}

fn select_work_list(
    merged: &SourceMap,
    target: &SyncTarget,
) -> Result<Vec<SourceRecord>, SyncError> {
    match target {
        SyncTarget::All => Ok(merged.values().cloned().collect()),
        SyncTarget::Alias(alias) => merged
            .get(alias)
            .cloned()
            .map(|record| vec![record])
            .ok_or_else(|| SyncError::AliasNotFound {
                alias: alias.clone(),
                origin: "default or custom sources".to_string(),
            }),
    }
}

impl Reconciler<'_> {
    pub fn run(&self, target: &SyncTarget) -> Result<ReconcileReport, SyncError> {
        let merged = registry::load_merged(self.paths)?;
        let work = select_work_list(&merged, target)?;
        sweep_stale_staging(&self.paths.templates_dir);

        let mut report = ReconcileReport::default();
        let mut pending = Vec::new();
        for record in work {
            let alias = record.alias.clone();
            match self.resolve_one(record) {
                Ok(resolved) if resolved.needs_update => pending.push(resolved),
                Ok(resolved) => {
                    tracing::info!(
                        alias = %alias,
                        revision = %resolved.target_revision,
                        "up to date"
                    );
                    report.outcomes.insert(
                        alias,
                        SourceOutcome::UpToDate {
                            revision: resolved.target_revision,
                        },
                    );
                }
                Err(err @ SyncError::UnsupportedForge { .. }) => {
                    let reason = err.to_string();
                    let code = err.code().as_str();
                    warn::emit(code, "resolve", &alias, "unsupported forge", &reason);
                    audit::record(self.paths, "resolve", "skipped", Some(&alias), &reason);
                    report.outcomes.insert(
                        alias,
                        SourceOutcome::SkippedUnsupported { reason },
                    );
                }
                Err(err) => {
                    self.note_failure(&mut report, &alias, FailureStage::Resolve, &err);
                }
            }
        }

        if pending.is_empty() {
            tracing::info!("no updates required");
            return Ok(report);
        }

        fs::create_dir_all(&self.paths.templates_dir).map_err(|err| SyncError::WriteFailure {
            path: self.paths.templates_dir.clone(),
            reason: err.to_string(),
        })?;
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.paths.templates_dir)
            .map_err(|err| SyncError::WriteFailure {
                path: self.paths.templates_dir.clone(),
                reason: format!("failed to create staging dir: {err}"),
            })?;

        for resolved in pending {
            let alias = resolved.record.alias.clone();
            if self.cancel.is_cancelled() {
                tracing::warn!(alias = %alias, "update cancelled before fetch");
                audit::record(self.paths, "apply", "cancelled", Some(&alias), "cancel requested");
                report.outcomes.insert(alias, SourceOutcome::Cancelled);
                continue;
            }

            report.downloads += 1;
            match self.apply_one(&resolved, staging.path()) {
                Ok(stats) => {
                    tracing::info!(
                        alias = %alias,
                        from = resolved.installed_revision.as_deref().unwrap_or("-"),
                        to = %resolved.target_revision,
                        files = stats.files,
                        bytes = stats.bytes,
                        skipped_links = stats.skipped_links,
                        "source updated"
                    );
                    let revision = &resolved.target_revision;
                    audit::record(self.paths, "apply", "updated", Some(&alias), revision);
                    report.outcomes.insert(
                        alias,
                        SourceOutcome::Updated {
                            from: resolved.installed_revision,
                            to: resolved.target_revision,
                            files: stats.files,
                        },
                    );
                }
                Err((stage, err)) => self.note_failure(&mut report, &alias, stage, &err),
            }
        }

        let staging_path = staging.path().to_path_buf();
        if let Err(err) = staging.close() {
            tracing::warn!(
                path = %staging_path.display(),
                error = %err,
                "failed to remove staging dir"
            );
        }

        Ok(report)
    }

    pub fn resolve_one(&self, record: SourceRecord) -> Result<ResolvedSource, SyncError> {
        validate_alias(&record.alias)?;
        let resolved = resolver::resolve(&record, self.forge)?;
        tracing::debug!(
            alias = %record.alias,
            revision = %resolved.revision,
            floating = resolved.floating,
            "target revision resolved"
        );
        let local_path = self.paths.install_dir(&record.alias);
        let installed = installed::read_installed(&local_path);
        let needs_update =
            installed::needs_update(installed.as_ref(), &record.repo, &resolved.revision);

        Ok(ResolvedSource {
            installed_revision: installed.map(|m| m.sha),
            repo: resolved.repo,
            target_revision: resolved.revision,
            local_path,
            needs_update,
            record,
        })
    }

    fn apply_one(
        &self,
        resolved: &ResolvedSource,
        staging: &Path,
    ) -> Result<UnpackStats, (FailureStage, SyncError)> {
        let alias = &resolved.record.alias;
        let url = self.forge.archive_url(&resolved.repo, &resolved.target_revision);
        let archive = download_archive(self.fetcher, &url, &staging.join("downloads"), alias)
            .map_err(|err| (FailureStage::Download, err))?;

        let staged = staging.join("trees").join(alias);
        let file = fs::File::open(&archive).map_err(|err| {
            (
                FailureStage::Unpack,
                SyncError::ExtractionFailure {
                    path: archive.clone(),
                    reason: err.to_string(),
                },
            )
        })?;
        let prefix = resolved.repo.archive_prefix(&resolved.target_revision);
        let stats =
            unpack::unpack(file, &staged, &prefix).map_err(|err| (FailureStage::Unpack, err))?;
        if let Err(err) = fs::remove_file(&archive) {
            tracing::debug!(
                path = %archive.display(),
                error = %err,
                "failed to remove downloaded archive"
            );
        }

        installed::write_installed(
            &staged,
            &InstalledSnapshotMetadata {
                source: resolved.record.repo.clone(),
                sha: resolved.target_revision.clone(),
            },
        )
        .map_err(|err| (FailureStage::Install, err))?;

        let trash_dir = staging.join("trash");
        fs::create_dir_all(&trash_dir).map_err(|err| {
            (
                FailureStage::Install,
                SyncError::WriteFailure {
                    path: trash_dir.clone(),
                    reason: err.to_string(),
                },
            )
        })?;
        unpack::replace_tree(&staged, &resolved.local_path, &trash_dir.join(alias))
            .map_err(|err| (FailureStage::Install, err))?;

        Ok(stats)
    }

    fn note_failure(
        &self,
        report: &mut ReconcileReport,
        alias: &str,
        stage: FailureStage,
        err: &SyncError,
    ) {
        let error = err.to_string();
        warn::emit(err.code().as_str(), stage.as_str(), alias, "per-source failure", &error);
        audit::record(self.paths, stage.as_str(), "failed", Some(alias), &error);
        report
            .outcomes
            .insert(alias.to_string(), SourceOutcome::Failed { stage, error });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::resolver::tests::FakeForge;
    use crate::sources::unpack::tests::build_archive;
    use std::cell::{Cell, RefCell};
    use tempfile::tempdir;

    #[derive(Default)]
    struct FakeFetcher {
        archives: RefCell<BTreeMap<String, Vec<u8>>>,
        calls: Cell<usize>,
    }

    impl FakeFetcher {
        fn serve(&self, url: &str, bytes: Vec<u8>) {
            self.archives.borrow_mut().insert(url.to_string(), bytes);
        }
    }

    impl ArchiveFetcher for FakeFetcher {
        fn download(&self, url: &str, dest: &Path) -> Result<u64, SyncError> {
            self.calls.set(self.calls.get() + 1);
            let archives = self.archives.borrow();
            let bytes = archives.get(url).ok_or_else(|| SyncError::DownloadFailure {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            })?;
            fs::write(dest, bytes).expect("write fake download");
            Ok(bytes.len() as u64)
        }
    }

    fn write_custom(paths: &SourcePaths, records: &[SourceRecord]) {
        registry::save(&paths.custom_sources, records).expect("save custom");
    }

    fn demo_record(sha: &str) -> SourceRecord {
        SourceRecord::new("demo", "https://github.com/acme/demo", sha)
    }

    fn demo_archive(revision: &str, body: &[u8]) -> Vec<u8> {
        let readme = format!("demo-{revision}/README.md");
        let dir = format!("demo-{revision}/");
        build_archive(&[(dir.as_str(), b""), (readme.as_str(), body)])
    }

    fn run(
        paths: &SourcePaths,
        forge: &FakeForge,
        fetcher: &FakeFetcher,
        target: SyncTarget,
    ) -> ReconcileReport {
        Reconciler {
            paths,
            forge,
            fetcher,
            cancel: CancelToken::default(),
        }
        .run(&target)
        .expect("reconcile")
    }

    #[test]
    fn latest_source_is_resolved_downloaded_and_recorded() {
        let tmp = tempdir().expect("tempdir");
        let paths = SourcePaths::under(tmp.path());
        write_custom(&paths, &[demo_record("latest")]);
        let forge = FakeForge::with_tip("acme/demo", "main", "abc123");
        let fetcher = FakeFetcher::default();
        fetcher.serve("fake://acme/demo/abc123", demo_archive("abc123", b"hello"));

        let report = run(&paths, &forge, &fetcher, SyncTarget::Alias("demo".to_string()));

        assert_eq!(
            report.outcomes["demo"],
            SourceOutcome::Updated {
                from: None,
                to: "abc123".to_string(),
                files: 1
            }
        );
        let install_dir = paths.install_dir("demo");
        assert_eq!(fs::read(install_dir.join("README.md")).expect("readme"), b"hello");
        assert!(!install_dir.join("demo-abc123").exists());
        assert_eq!(
            installed::read_installed(&install_dir),
            Some(InstalledSnapshotMetadata {
                source: "https://github.com/acme/demo".to_string(),
                sha: "abc123".to_string(),
            })
        );
    }

    #[test]
    fn unchanged_tip_requires_no_download() {
        let tmp = tempdir().expect("tempdir");
        let paths = SourcePaths::under(tmp.path());
        write_custom(&paths, &[demo_record("latest")]);
        let install_dir = paths.install_dir("demo");
        fs::create_dir_all(&install_dir).expect("mkdir");
        installed::write_installed(
            &install_dir,
            &InstalledSnapshotMetadata {
                source: "https://github.com/acme/demo".to_string(),
                sha: "abc123".to_string(),
            },
        )
        .expect("write metadata");

        let forge = FakeForge::with_tip("acme/demo", "main", "abc123");
        let fetcher = FakeFetcher::default();
        let report = run(&paths, &forge, &fetcher, SyncTarget::All);

        assert!(report.no_updates_required());
        assert_eq!(report.downloads, 0);
        assert_eq!(fetcher.calls.get(), 0);
    }

    #[test]
    fn second_run_without_remote_changes_applies_nothing() {
        let tmp = tempdir().expect("tempdir");
        let paths = SourcePaths::under(tmp.path());
        write_custom(&paths, &[demo_record("latest")]);
        let forge = FakeForge::with_tip("acme/demo", "main", "abc123");
        let fetcher = FakeFetcher::default();
        fetcher.serve("fake://acme/demo/abc123", demo_archive("abc123", b"v1"));

        assert_eq!(run(&paths, &forge, &fetcher, SyncTarget::All).updated(), 1);
        let second = run(&paths, &forge, &fetcher, SyncTarget::All);
        assert_eq!(second.updated(), 0);
        assert!(second.no_updates_required());
        assert_eq!(fetcher.calls.get(), 1);
    }

    #[test]
    fn moved_tip_triggers_reinstall() {
        let tmp = tempdir().expect("tempdir");
        let paths = SourcePaths::under(tmp.path());
        write_custom(&paths, &[demo_record("latest")]);
        let mut forge = FakeForge::with_tip("acme/demo", "main", "abc123");
        let fetcher = FakeFetcher::default();
        fetcher.serve("fake://acme/demo/abc123", demo_archive("abc123", b"v1"));
        fetcher.serve("fake://acme/demo/def456", demo_archive("def456", b"v2"));
        run(&paths, &forge, &fetcher, SyncTarget::All);

        forge.set_tip("acme/demo", "main", "def456");
        let report = run(&paths, &forge, &fetcher, SyncTarget::All);

        assert_eq!(
            report.outcomes["demo"],
            SourceOutcome::Updated {
                from: Some("abc123".to_string()),
                to: "def456".to_string(),
                files: 1
            }
        );
        assert_eq!(fs::read(paths.install_dir("demo").join("README.md")).expect("readme"), b"v2");
    }

    #[test]
    fn unknown_named_alias_is_fatal_before_any_work() {
        let tmp = tempdir().expect("tempdir");
        let paths = SourcePaths::under(tmp.path());
        write_custom(&paths, &[demo_record("latest")]);
        let forge = FakeForge::with_tip("acme/demo", "main", "abc123");
        let fetcher = FakeFetcher::default();

        let err = Reconciler {
            paths: &paths,
            forge: &forge,
            fetcher: &fetcher,
            cancel: CancelToken::default(),
        }
        .run(&SyncTarget::Alias("ghost".to_string()))
        .expect_err("should fail");

        assert!(matches!(err, SyncError::AliasNotFound { .. }));
        assert_eq!(forge.lookups.get(), 0);
        assert!(!paths.templates_dir.exists());
    }

    #[test]
    fn per_source_failures_do_not_stop_the_run() {
        let tmp = tempdir().expect("tempdir");
        let paths = SourcePaths::under(tmp.path());
        write_custom(
            &paths,
            &[
                SourceRecord::new("broken", "https://github.com/acme/broken", "latest"),
                SourceRecord::new("elsewhere", "https://gitlab.com/acme/x", "latest"),
                SourceRecord::new("nodl", "https://github.com/acme/nodl", "fff000"),
                demo_record("latest"),
            ],
        );
        let forge = FakeForge::with_tip("acme/demo", "main", "abc123");
        let fetcher = FakeFetcher::default();
        fetcher.serve("fake://acme/demo/abc123", demo_archive("abc123", b"ok"));

        let report = run(&paths, &forge, &fetcher, SyncTarget::All);

        assert!(matches!(
            report.outcomes["broken"],
            SourceOutcome::Failed { stage: FailureStage::Resolve, .. }
        ));
        assert!(matches!(
            report.outcomes["elsewhere"],
            SourceOutcome::SkippedUnsupported { .. }
        ));
        assert!(matches!(
            report.outcomes["nodl"],
            SourceOutcome::Failed { stage: FailureStage::Download, .. }
        ));
        assert_eq!(report.updated(), 1);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.skipped(), 1);
        assert!(!paths.install_dir("nodl").exists());
    }

    #[test]
    fn failed_unpack_keeps_previous_install() {
        let tmp = tempdir().expect("tempdir");
        let paths = SourcePaths::under(tmp.path());
        write_custom(&paths, &[demo_record("latest")]);
        let mut forge = FakeForge::with_tip("acme/demo", "main", "abc123");
        let fetcher = FakeFetcher::default();
        fetcher.serve("fake://acme/demo/abc123", demo_archive("abc123", b"v1"));
        run(&paths, &forge, &fetcher, SyncTarget::All);

        forge.set_tip("acme/demo", "main", "bad999");
        fetcher.serve(
            "fake://acme/demo/bad999",
            build_archive(&[("demo-bad999/../../evil.txt", b"x")]),
        );
        let report = run(&paths, &forge, &fetcher, SyncTarget::All);

        assert!(matches!(
            report.outcomes["demo"],
            SourceOutcome::Failed { stage: FailureStage::Unpack, .. }
        ));
        let install_dir = paths.install_dir("demo");
        assert_eq!(fs::read(install_dir.join("README.md")).expect("readme"), b"v1");
        assert_eq!(
            installed::read_installed(&install_dir).map(|m| m.sha),
            Some("abc123".to_string())
        );
        assert!(!tmp.path().join("evil.txt").exists());
    }

    #[test]
    fn cancellation_stops_before_fetching() {
        let tmp = tempdir().expect("tempdir");
        let paths = SourcePaths::under(tmp.path());
        write_custom(&paths, &[demo_record("latest")]);
        let forge = FakeForge::with_tip("acme/demo", "main", "abc123");
        let fetcher = FakeFetcher::default();
        fetcher.serve("fake://acme/demo/abc123", demo_archive("abc123", b"v1"));

        fs::create_dir_all(&paths.state_dir).expect("mkdir state");
        fs::write(paths.stop_file(), "").expect("touch stop file");
        let cancel = CancelToken::with_stop_file(paths.stop_file());
        let report = Reconciler {
            paths: &paths,
            forge: &forge,
            fetcher: &fetcher,
            cancel,
        }
        .run(&SyncTarget::All)
        .expect("reconcile");

        assert_eq!(report.outcomes["demo"], SourceOutcome::Cancelled);
        assert_eq!(fetcher.calls.get(), 0);
    }

    #[test]
    fn stop_file_requests_cancellation() {
        let tmp = tempdir().expect("tempdir");
        let stop = tmp.path().join("update.stop");
        let cancel = CancelToken::with_stop_file(stop.clone());
        assert!(!cancel.is_cancelled());
        fs::write(&stop, "").expect("touch");
        assert!(cancel.is_cancelled());
        cancel.clear_stale();
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn staging_dir_is_removed_after_run() {
        let tmp = tempdir().expect("tempdir");
        let paths = SourcePaths::under(tmp.path());
        write_custom(&paths, &[demo_record("latest")]);
        let forge = FakeForge::with_tip("acme/demo", "main", "abc123");
        let fetcher = FakeFetcher::default();
        fetcher.serve("fake://acme/demo/abc123", demo_archive("abc123", b"v1"));

        run(&paths, &forge, &fetcher, SyncTarget::All);

        let leftovers: Vec<_> = fs::read_dir(&paths.templates_dir)
            .expect("read templates")
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(leftovers, vec!["demo".to_string()]);
    }

    #[test]
    fn leftover_staging_dirs_are_swept_on_next_run() {
        let tmp = tempdir().expect("tempdir");
        let paths = SourcePaths::under(tmp.path());
        write_custom(&paths, &[demo_record("latest")]);
        let stale = paths.templates_dir.join(format!("{STAGING_PREFIX}killed"));
        fs::create_dir_all(stale.join("downloads")).expect("mkdir stale");
        fs::write(stale.join("downloads/demo.tar.gz"), b"partial").expect("write partial");

        let forge = FakeForge::with_tip("acme/demo", "main", "abc123");
        let fetcher = FakeFetcher::default();
        fetcher.serve("fake://acme/demo/abc123", demo_archive("abc123", b"v1"));
        run(&paths, &forge, &fetcher, SyncTarget::All);

        assert!(!stale.exists());
        assert!(paths.install_dir("demo").join("README.md").exists());
    }

    #[test]
    fn leftover_staging_dirs_are_swept_even_when_nothing_is_stale() {
        let tmp = tempdir().expect("tempdir");
        let paths = SourcePaths::under(tmp.path());
        write_custom(&paths, &[demo_record("abc123")]);
        let install_dir = paths.install_dir("demo");
        fs::create_dir_all(&install_dir).expect("mkdir");
        installed::write_installed(
            &install_dir,
            &InstalledSnapshotMetadata {
                source: "https://github.com/acme/demo".to_string(),
                sha: "abc123".to_string(),
            },
        )
        .expect("write metadata");
        let stale = paths.templates_dir.join(format!("{STAGING_PREFIX}old"));
        fs::create_dir_all(stale.join("trees/demo")).expect("mkdir stale");

        let report = run(&paths, &FakeForge::default(), &FakeFetcher::default(), SyncTarget::All);

        assert!(report.no_updates_required());
        assert!(!stale.exists());
        assert!(install_dir.exists());
    }

    #[test]
    fn sync_target_parses_all_case_insensitively() {
        assert_eq!(SyncTarget::parse("ALL"), SyncTarget::All);
        assert_eq!(SyncTarget::parse("demo"), SyncTarget::Alias("demo".to_string()));
    }
}
