use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the custom field that carries the sprint history of an issue.
pub const SPRINT_FIELD: &str = "Sprint";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IssueType {
    Epic,
    Story,
    Task,
    SubTask,
    Bug,
    Other(String),
}

impl IssueType {
    /// Batches in the order a full run migrates them: parents before children.
    pub const BATCH_ORDER: [IssueType; 5] = [
        IssueType::Epic,
        IssueType::Story,
        IssueType::Task,
        IssueType::SubTask,
        IssueType::Bug,
    ];

    pub fn from_name(name: &str) -> Self {
        match name {
            "Epic" => IssueType::Epic,
            "Story" => IssueType::Story,
            "Task" => IssueType::Task,
            "Sub-task" => IssueType::SubTask,
            "Bug" => IssueType::Bug,
            other => IssueType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            IssueType::Epic => "Epic",
            IssueType::Story => "Story",
            IssueType::Task => "Task",
            IssueType::SubTask => "Sub-task",
            IssueType::Bug => "Bug",
            IssueType::Other(name) => name,
        }
    }

    /// Only these types get an explicit destination state.
    pub fn carries_state(&self) -> bool {
        matches!(self, IssueType::Task | IssueType::Bug | IssueType::SubTask)
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for IssueType {
    fn from(name: String) -> Self {
        IssueType::from_name(&name)
    }
}

impl From<IssueType> for String {
    fn from(ty: IssueType) -> Self {
        ty.as_str().to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceIssue {
    pub key: String,
    pub issue_type: IssueType,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub reporter: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default)]
    pub priority: String,
    pub status_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_key: Option<String>,
    /// Custom field values by display name, each an ordered list of values.
    #[serde(default)]
    pub custom_fields: BTreeMap<String, Vec<String>>,
}

impl SourceIssue {
    /// Parent key, treating an empty string the same as no parent.
    pub fn parent(&self) -> Option<&str> {
        self.parent_key.as_deref().filter(|k| !k.is_empty())
    }

    pub fn sprints(&self) -> Option<&[String]> {
        self.custom_fields
            .get(SPRINT_FIELD)
            .map(Vec::as_slice)
            .filter(|values| !values.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub body: String,
    #[serde(default)]
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    /// Where the source serves the binary content.
    pub content_url: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLink {
    pub relation: String,
    pub target_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceProject {
    pub key: String,
    pub name: String,
}
