pub mod hierarchy;
pub mod orchestrator;
pub mod payload;
pub mod repro;
pub mod report;
pub mod translate;


use anyhow::Result;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::journal::Journal;
use crate::providers::{IssueSource, WorkItemDestination};
use orchestrator::{MigrationOptions, Migrator};
use report::{BatchReport, RunSummary};
use translate::IdentityMap;

/// One full pass over the configured type batches.
///
/// Only the destination project lookup is fatal. A batch that cannot be listed
/// is recorded and skipped.
pub async fn run(
    source: &dyn IssueSource,
    destination: &dyn WorkItemDestination,
    config: &AppConfig,
    journal: Option<&Journal>,
) -> Result<RunSummary> {
    let mut migrator = Migrator::connect(
        source,
        destination,
        &config.azure.project,
        IdentityMap::new(config.identities.clone()),
        MigrationOptions::from(&config.migration),
    )
    .await?;

    let project_key = &config.jira.project_key;
    let mut summary = RunSummary::default();

    for issue_type in config.migration.batch_types() {
        let batch = issue_type.to_string();
        let issues = match source
            .list_issues(project_key, Some(&issue_type), 0, config.migration.max_issues)
            .await
        {
            Ok(issues) => issues,
            Err(e) => {
                error!(batch = %batch, "Error: could not list {batch} issues: {e:#}");
                summary
                    .batches
                    .push(BatchReport::listing_failed(batch, format!("{e:#}")));
                continue;
            }
        };

        let report = migrator.migrate(&batch, &issues).await;
        info!(
            batch = %batch,
            migrated = report.migrated(),
            failed = report.failed(),
            "batch finished"
        );

        if let Some(journal) = journal {
            if let Err(e) = journal.record_batch(&report) {
                warn!(path = %journal.path().display(), "could not write journal: {e:#}");
            }
        }
        summary.batches.push(report);
    }

    Ok(summary)
}
