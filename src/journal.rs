use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::data_dir;
use crate::migration::report::{BatchReport, IssueOutcome};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: String,
    pub batch: String,
    pub issue_key: String,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_item_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Append-only JSONL record of issue outcomes, one line per issue.
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_path() -> PathBuf {
        data_dir().join("migration-journal.jsonl")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &JournalEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    pub fn record_batch(&self, report: &BatchReport) -> Result<()> {
        for outcome in &report.outcomes {
            self.append(&entry_for(&report.batch, outcome))?;
        }
        Ok(())
    }

    pub fn read_entries(&self, limit: Option<usize>) -> Vec<JournalEntry> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        let mut entries: Vec<JournalEntry> = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();

        if let Some(limit) = limit {
            let len = entries.len();
            if len > limit {
                entries = entries.split_off(len - limit);
            }
        }

        entries
    }
}

fn entry_for(batch: &str, outcome: &IssueOutcome) -> JournalEntry {
    let timestamp = chrono::Utc::now().to_rfc3339();
    match outcome {
        IssueOutcome::Created { key, id } => JournalEntry {
            timestamp,
            batch: batch.to_string(),
            issue_key: key.clone(),
            event: "created".into(),
            work_item_id: Some(*id),
            message: None,
        },
        IssueOutcome::Failed { key, error } => JournalEntry {
            timestamp,
            batch: batch.to_string(),
            issue_key: key.clone(),
            event: "failed".into(),
            work_item_id: None,
            message: Some(error.clone()),
        },
    }
}
