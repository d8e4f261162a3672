use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use crate::commands::source_add::{self, SourceAddOptions};
use crate::commands::source_list::{self, ListScope, SourceListOptions};
use crate::commands::source_remove::{self, SourceRemoveOptions};
use crate::commands::source_update::{self, SourceUpdateOptions};
use crate::commands::CommandReport;
use crate::logging;

#[derive(Debug, Parser)]
#[command(name = "tmplsync", version, about = "Manage and synchronise template sources")]
struct Cli {
    /// Print command reports as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage template sources.
    Source {
        #[command(subcommand)]
        command: SourceCommand,
    },
}

#[derive(Debug, Subcommand)]
enum SourceCommand {
    /// Add or replace a custom source.
    Add {
        #[command(subcommand)]
        kind: AddKind,
    },
    /// Remove a custom source, or `all` to clear the custom list.
    Remove {
        #[arg(value_name = "ALIAS|all")]
        target: String,
    },
    /// List default, custom, or merged sources.
    List {
        #[arg(value_enum, default_value_t = ListArg::All)]
        scope: ListArg,
    },
    /// Download new snapshots for one source, or `all`.
    Update {
        #[arg(value_name = "ALIAS|all")]
        target: String,
        /// Only download template updates; skip rendering.
        #[arg(long)]
        no_render: bool,
    },
}

#[derive(Debug, Subcommand)]
enum AddKind {
    /// A git repository hosted on the forge.
    Git {
        alias: String,
        url: String,
        /// Commit to pin, or `latest` to follow the default branch.
        #[arg(long, default_value = "latest")]
        sha: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ListArg {
    Default,
    Custom,
    All,
}

impl From<ListArg> for ListScope {
    fn from(value: ListArg) -> Self {
        match value {
            ListArg::Default => ListScope::Default,
            ListArg::Custom => ListScope::Custom,
            ListArg::All => ListScope::All,
        }
    }
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let report = match cli.command {
        Command::Source { command } => match command {
            SourceCommand::Add {
                kind: AddKind::Git { alias, url, sha },
            } => source_add::run(&SourceAddOptions { alias, url, sha })?,
            SourceCommand::Remove { target } => {
                source_remove::run(&SourceRemoveOptions { target })?
            }
            SourceCommand::List { scope } => source_list::run(&SourceListOptions {
                scope: scope.into(),
            })?,
            SourceCommand::Update { target, no_render } => {
                source_update::run(&SourceUpdateOptions { target, no_render })?
            }
        },
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        anyhow::bail!(
            "{} finished with {} issue(s)",
            report.command,
            report.issues.len()
        );
    }
    Ok(())
}
