use anyhow::Result;

use crate::commands::CommandReport;
use crate::error::SyncError;
use crate::sources::lock;
use crate::sources::paths::resolve_paths;
use crate::sources::registry::{self, RegistryList};

#[derive(Debug, Clone)]
pub struct SourceRemoveOptions {
    pub target: String,
}

pub fn run(opts: &SourceRemoveOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("source-remove");
    let _lock = lock::acquire(&paths.lock_file())?;
    let custom = &paths.custom_sources;

    if opts.target.trim().eq_ignore_ascii_case("all") {
        let removed = registry::remove_all(custom)?;
        if removed == 0 {
            report.detail(format!("No custom sources to remove in {}", custom.display()));
        } else {
            report.detail(format!(
                "All entries removed from custom sources ({removed} removed)"
            ));
        }
        return Ok(report);
    }

    let alias = opts.target.trim();
    match registry::remove(custom, alias, &custom.display().to_string()) {
        Ok(record) => {
            report.detail(format!(
                "Removed {} from custom sources ({})",
                record.alias,
                custom.display()
            ));
            Ok(report)
        }
        Err(err @ SyncError::AliasNotFound { .. }) => {
            let defaults = registry::load_list(&paths, RegistryList::Default)?;
            if defaults.iter().any(|r| r.alias == alias) {
                return Err(anyhow::Error::new(err)
                    .context("alias is defined in the default sources, which are read-only"));
            }
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}
