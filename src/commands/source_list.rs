use anyhow::Result;

use crate::commands::CommandReport;
use crate::sources::installed;
use crate::sources::paths::{SourcePaths, resolve_paths};
use crate::sources::registry::{self, RegistryList, SourceRecord, merge_defaults_and_custom};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    Default,
    Custom,
    All,
}

#[derive(Debug, Clone)]
pub struct SourceListOptions {
    pub scope: ListScope,
}

fn record_line(record: &SourceRecord) -> String {
    format!("{}  {}  {}", record.alias, record.repo, record.sha)
}

fn list_one(paths: &SourcePaths, list: RegistryList, report: &mut CommandReport) -> Result<()> {
    let records = registry::load_list(paths, list)?;
    if records.is_empty() {
        report.detail(format!("no {} sources", list.label()));
    }
    let mut sorted = records;
    sorted.sort_by(|a, b| a.alias.cmp(&b.alias));
    for record in &sorted {
        report.detail(record_line(record));
    }
    Ok(())
}

pub fn run(opts: &SourceListOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("source-list");

    match opts.scope {
        ListScope::Default => list_one(&paths, RegistryList::Default, &mut report)?,
        ListScope::Custom => list_one(&paths, RegistryList::Custom, &mut report)?,
        ListScope::All => {
            let defaults = registry::load_list(&paths, RegistryList::Default)?;
            let custom = registry::load_list(&paths, RegistryList::Custom)?;
            let merged = merge_defaults_and_custom(&defaults, &custom);
            if merged.is_empty() {
                report.detail("no sources");
            }
            for (alias, record) in &merged {
                let in_default = defaults.iter().any(|r| &r.alias == alias);
                let in_custom = custom.iter().any(|r| &r.alias == alias);
                let origin = match (in_default, in_custom) {
                    (true, true) => "custom (overrides default)",
                    (false, true) => "custom",
                    _ => "default",
                };
                let installed = installed::read_installed(&paths.install_dir(alias))
                    .map(|m| m.sha)
                    .unwrap_or_else(|| "-".to_string());
                report.detail(format!(
                    "{}  [{origin}]  installed={installed}",
                    record_line(record)
                ));
            }
        }
    }

    Ok(report)
}
