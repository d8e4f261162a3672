use anyhow::{Context, Result};

use crate::commands::CommandReport;
use crate::sources::config::load_config;
use crate::sources::forge::parse_repo_url;
use crate::sources::lock;
use crate::sources::paths::{resolve_paths, validate_alias};
use crate::sources::registry::{self, AddOutcome, SourceRecord};

#[derive(Debug, Clone)]
pub struct SourceAddOptions {
    pub alias: String,
    pub url: String,
    pub sha: String,
}

pub fn run(opts: &SourceAddOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths.home)?;
    let mut report = CommandReport::new("source-add");

    validate_alias(&opts.alias)?;
    let repo = parse_repo_url(&opts.url, &cfg.forge.host)?;

    let _lock = lock::acquire(&paths.lock_file())?;
    let record = SourceRecord::new(opts.alias.trim(), opts.url.trim(), opts.sha.trim());
    let outcome = registry::add_or_replace(&paths.custom_sources, record.clone())
        .with_context(|| format!("failed to add `{}`", record.alias))?;

    let verb = match outcome {
        AddOutcome::Added => "added",
        AddOutcome::Replaced => "replaced",
    };
    report.detail(format!(
        "{verb} {} -> {} ({}) @ {}",
        record.alias,
        record.repo,
        repo.slug(),
        record.sha
    ));
    report.detail(format!(
        "New information successfully added to {}",
        paths.custom_sources.display()
    ));
    Ok(report)
}
