#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueOutcome {
    Created { key: String, id: i64 },
    Failed { key: String, error: String },
}

/// Result of migrating one batch of issues.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub batch: String,
    pub total: usize,
    pub outcomes: Vec<IssueOutcome>,
    pub state_update_failures: usize,
    pub attachments_uploaded: usize,
    pub attachments_skipped: usize,
    pub comments_migrated: usize,
    pub comments_failed: usize,
    /// Set when the batch could not even be listed from the source.
    pub batch_error: Option<String>,
}

impl BatchReport {
    pub fn new(batch: impl Into<String>, total: usize) -> Self {
        Self {
            batch: batch.into(),
            total,
            ..Default::default()
        }
    }

    pub fn listing_failed(batch: impl Into<String>, error: String) -> Self {
        Self {
            batch: batch.into(),
            batch_error: Some(error),
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: IssueOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn migrated(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, IssueOutcome::Created { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.migrated()
    }

    /// Issues not yet successfully migrated.
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.migrated())
    }

    #[cfg(test)]
    pub fn created_id(&self, key: &str) -> Option<i64> {
        self.outcomes.iter().find_map(|o| match o {
            IssueOutcome::Created { key: k, id } if k == key => Some(*id),
            _ => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|o| match o {
            IssueOutcome::Failed { key, error } => Some((key.as_str(), error.as_str())),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub batches: Vec<BatchReport>,
}

impl RunSummary {
    pub fn migrated(&self) -> usize {
        self.batches.iter().map(BatchReport::migrated).sum()
    }

    pub fn failed(&self) -> usize {
        self.batches.iter().map(BatchReport::failed).sum()
    }

    pub fn print_summary(&self) {
        println!("\n=== Migration Summary ===\n");
        for batch in &self.batches {
            match &batch.batch_error {
                Some(error) => println!("{:<10} could not be listed: {error}", batch.batch),
                None => println!(
                    "{:<10} {} of {} migrated, {} failed, {} state updates failed, {} comments ({} failed), {} attachments ({} skipped)",
                    batch.batch,
                    batch.migrated(),
                    batch.total,
                    batch.failed(),
                    batch.state_update_failures,
                    batch.comments_migrated,
                    batch.comments_failed,
                    batch.attachments_uploaded,
                    batch.attachments_skipped,
                ),
            }
        }

        let failures: Vec<(&str, &str)> = self.batches.iter().flat_map(|b| b.failures()).collect();
        if !failures.is_empty() {
            println!("\nFailed issues ({}):", failures.len());
            for (key, error) in failures {
                println!("  {key}: {error}");
            }
        }

        println!("\nTotal migrated: {}, failed: {}", self.migrated(), self.failed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_follow_outcomes() {
        let mut report = BatchReport::new("Task", 3);
        report.record(IssueOutcome::Created {
            key: "A".into(),
            id: 1,
        });
        assert_eq!(report.remaining(), 2);
        report.record(IssueOutcome::Failed {
            key: "B".into(),
            error: "boom".into(),
        });
        report.record(IssueOutcome::Created {
            key: "C".into(),
            id: 3,
        });

        assert_eq!(report.migrated(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.remaining(), 1);
        assert_eq!(report.created_id("C"), Some(3));
        assert_eq!(report.created_id("B"), None);
        assert_eq!(report.failures().collect::<Vec<_>>(), vec![("B", "boom")]);
    }

    #[test]
    fn run_summary_adds_up_batches() {
        let mut epics = BatchReport::new("Epic", 1);
        epics.record(IssueOutcome::Created {
            key: "E".into(),
            id: 1,
        });
        let bugs = BatchReport::listing_failed("Bug", "timeout".into());

        let summary = RunSummary {
            batches: vec![epics, bugs],
        };
        assert_eq!(summary.migrated(), 1);
        assert_eq!(summary.failed(), 0);
    }
}
