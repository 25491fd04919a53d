use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::{self, AppConfig};
use crate::journal::Journal;
use crate::migration;
use crate::model::work_item::TreeStructureGroup;
use crate::providers;

/// Migrate Jira issues into Azure DevOps work items
#[derive(Parser, Debug)]
#[command(name = "work-migrate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (default: ~/.work-migrate/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Migrate every configured issue type batch
    Run,

    /// Connect to both services and show what a run would target
    Check,

    /// Overwrite the repro steps of Bugs whose title matches a pattern
    ReproSteps {
        /// Regular expression matched against the work item title
        pattern: String,
        /// New repro steps text
        text: String,
    },

    /// Show the most recent journal entries
    Journal {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let load = || config::load_config(self.config.as_deref());
        match self.command {
            Commands::Run => handle_run(&load()?).await,
            Commands::Check => handle_check(&load()?).await,
            Commands::ReproSteps { pattern, text } => {
                handle_repro_steps(&load()?, &pattern, &text).await
            }
            Commands::Journal { limit } => {
                handle_journal(limit);
                Ok(())
            }
        }
    }
}

async fn handle_run(config: &AppConfig) -> Result<()> {
    let source = providers::create_source(config)?;
    let destination = providers::create_destination(config)?;
    let journal = config
        .journal
        .enabled
        .then(|| Journal::new(Journal::default_path()));

    println!(
        "Migrating {} from {} into {} ({})",
        config.jira.project_key,
        source.name(),
        config.azure.project,
        destination.name()
    );

    let summary =
        migration::run(source.as_ref(), destination.as_ref(), config, journal.as_ref()).await?;
    summary.print_summary();

    if let Some(journal) = &journal {
        println!("Journal: {}", journal.path().display());
    }
    Ok(())
}

async fn handle_check(config: &AppConfig) -> Result<()> {
    let source = providers::create_source(config)?;
    let destination = providers::create_destination(config)?;

    let project = source.get_project(&config.jira.project_key).await?;
    println!("{}: {} ({})", source.name(), project.name, project.key);

    let types = source.get_issue_types(&project.key).await?;
    println!("  issue types: {}", types.join(", "));

    let team_project = destination.get_project(&config.azure.project).await?;
    println!(
        "{}: {} ({})",
        destination.name(),
        team_project.name,
        team_project.id
    );

    for group in [TreeStructureGroup::Iterations, TreeStructureGroup::Areas] {
        let node = destination
            .get_classification_node(&team_project.name, group)
            .await?;
        println!(
            "  {} root: {}",
            group.as_str(),
            node.path.as_deref().unwrap_or(&node.name)
        );
    }

    let batches: Vec<String> = config
        .migration
        .batch_types()
        .iter()
        .map(ToString::to_string)
        .collect();
    println!("Batches: {}", batches.join(" -> "));
    Ok(())
}

async fn handle_repro_steps(config: &AppConfig, pattern: &str, text: &str) -> Result<()> {
    let destination = providers::create_destination(config)?;
    let report = migration::repro::update_repro_steps(
        destination.as_ref(),
        &config.azure.project,
        pattern,
        text,
    )
    .await?;

    println!(
        "Scanned {} bugs, updated {}, failed {}",
        report.scanned, report.updated, report.failed
    );
    Ok(())
}

fn handle_journal(limit: usize) {
    let journal = Journal::new(Journal::default_path());
    let entries = journal.read_entries(Some(limit));
    if entries.is_empty() {
        println!("No journal entries at {}", journal.path().display());
        return;
    }

    for entry in entries {
        let target = entry
            .work_item_id
            .map(|id| format!("#{id}"))
            .unwrap_or_default();
        println!(
            "{} {:<8} {:<10} {:<7} {target} {}",
            entry.timestamp,
            entry.batch,
            entry.issue_key,
            entry.event,
            entry.message.unwrap_or_default()
        );
    }
}
