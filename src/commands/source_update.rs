use anyhow::Result;

use crate::commands::CommandReport;
use crate::sources::audit;
use crate::sources::config::load_config;
use crate::sources::fetch::HttpFetcher;
use crate::sources::forge::GithubForge;
use crate::sources::lock;
use crate::sources::paths::resolve_paths;
use crate::sources::reconcile::{
    CancelToken, ReconcileReport, Reconciler, SourceOutcome, SyncTarget,
};

#[derive(Debug, Clone)]
pub struct SourceUpdateOptions {
    pub target: String,
    pub no_render: bool,
}

fn summarize(outcomes: &ReconcileReport, report: &mut CommandReport) {
    for (alias, outcome) in &outcomes.outcomes {
        let label = outcome.label();
        match outcome {
            SourceOutcome::Updated { from, to, files } => report.detail(format!(
                "{alias}: {label} {} -> {to} ({files} files)",
                from.as_deref().unwrap_or("(none)")
            )),
            SourceOutcome::UpToDate { revision } => {
                report.detail(format!("{alias}: {label} at {revision}"))
            }
            SourceOutcome::SkippedUnsupported { reason } => {
                report.detail(format!("{alias}: {label} ({reason})"))
            }
            SourceOutcome::Failed { stage, error } => {
                report.issue(format!("{alias}: {label} during {}: {error}", stage.as_str()))
            }
            SourceOutcome::Cancelled => report.issue(format!("{alias}: {label}")),
        }
    }

    if outcomes.no_updates_required() {
        report.detail("no updates required");
    }
    report.detail(format!(
        "summary: updated={} up_to_date={} skipped={} failed={} cancelled={} downloads={}",
        outcomes.updated(),
        outcomes.up_to_date(),
        outcomes.skipped(),
        outcomes.failed(),
        outcomes.cancelled(),
        outcomes.downloads
    ));
}

pub fn run(opts: &SourceUpdateOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths.home)?;
    let mut report = CommandReport::new("source-update");

    let target = SyncTarget::parse(&opts.target);
    match &target {
        SyncTarget::All => report.detail("Updating all sources"),
        SyncTarget::Alias(alias) => report.detail(format!("Updating source {alias}")),
    }

    let _lock = lock::acquire(&paths.lock_file())?;
    let forge = GithubForge::new(&cfg.forge, &cfg.network)?;
    let fetcher = HttpFetcher::new(&cfg.forge, &cfg.network)?;
    let cancel = CancelToken::with_stop_file(paths.stop_file());
    cancel.clear_stale();

    let outcomes = Reconciler {
        paths: &paths,
        forge: &forge,
        fetcher: &fetcher,
        cancel,
    }
    .run(&target)?;

    summarize(&outcomes, &mut report);
    audit::record(
        &paths,
        "update",
        if report.ok { "ok" } else { "partial" },
        None,
        &format!(
            "updated={} failed={}",
            outcomes.updated(),
            outcomes.failed()
        ),
    );

    if opts.no_render {
        report.detail("render=skipped (--no-render)");
    } else {
        report.detail("render=skipped (no renderers configured)");
    }

    Ok(report)
}
