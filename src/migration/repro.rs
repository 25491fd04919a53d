use anyhow::{Context, Result};
use regex::Regex;
use tracing::{error, info};

use crate::model::work_item::{fields, PatchDocument};
use crate::providers::WorkItemDestination;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReproReport {
    pub scanned: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Overwrite the repro steps of every Bug whose title matches `title_pattern`.
pub async fn update_repro_steps(
    destination: &dyn WorkItemDestination,
    project: &str,
    title_pattern: &str,
    text: &str,
) -> Result<ReproReport> {
    let pattern = Regex::new(title_pattern)
        .with_context(|| format!("Invalid title pattern: {title_pattern}"))?;
    let project = destination.get_project(project).await?;
    let ids = destination
        .query_by_type(&project.name, "Bug", &project.name)
        .await
        .context("Failed to query bugs")?;

    let mut patch = PatchDocument::new();
    patch.set_field(fields::REPRO_STEPS, text);

    let mut report = ReproReport::default();
    for id in ids {
        report.scanned += 1;
        let item = match destination.get_work_item(id).await {
            Ok(item) => item,
            Err(e) => {
                error!(id, "Error: could not fetch work item {id}: {e:#}");
                report.failed += 1;
                continue;
            }
        };

        let title = item.field_str(fields::TITLE).unwrap_or_default();
        if !pattern.is_match(title) {
            continue;
        }

        match destination.update_work_item(id, &patch).await {
            Ok(_) => {
                info!(id, title, "repro steps updated");
                report.updated += 1;
            }
            Err(e) => {
                error!(id, "Error: could not update repro steps of {id}: {e:#}");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::work_item::WorkItem;
    use crate::providers::tests::MockDestination;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn work_item(id: i64, work_item_type: &str, title: &str) -> WorkItem {
        let mut fields_map = BTreeMap::new();
        fields_map.insert(fields::WORK_ITEM_TYPE.to_string(), json!(work_item_type));
        fields_map.insert(fields::TITLE.to_string(), json!(title));
        WorkItem {
            id,
            rev: Some(3),
            fields: fields_map,
            url: None,
        }
    }

    #[tokio::test]
    async fn updates_only_matching_bugs() {
        let destination = MockDestination::with_existing(vec![
            work_item(1, "Bug", "SCP-10: crash on login"),
            work_item(2, "Bug", "SCP-11: typo"),
            work_item(3, "Task", "SCP-12: crash on logout"),
        ]);

        let report = update_repro_steps(&destination, "Scope", "crash", "See attached log")
            .await
            .unwrap();

        assert_eq!(
            report,
            ReproReport {
                scanned: 2,
                updated: 1,
                failed: 0
            }
        );
        let updates = destination.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, 1);
        assert_eq!(
            updates[0].1.field(fields::REPRO_STEPS),
            Some(&json!("See attached log"))
        );
    }

    #[tokio::test]
    async fn rejected_updates_are_counted() {
        let mut destination =
            MockDestination::with_existing(vec![work_item(1, "Bug", "one"), work_item(2, "Bug", "two")]);
        destination
            .failing_update_fields
            .insert(fields::REPRO_STEPS.to_string());

        let report = update_repro_steps(&destination, "Scope", ".*", "x")
            .await
            .unwrap();
        assert_eq!(report.updated, 0);
        assert_eq!(report.failed, 2);
    }

    #[tokio::test]
    async fn invalid_pattern_is_an_error() {
        let destination = MockDestination::default();
        let err = update_repro_steps(&destination, "Scope", "(", "x")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid title pattern"));
    }
}
