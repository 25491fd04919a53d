use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub mod fields {
    pub const TEAM_PROJECT: &str = "System.TeamProject";
    pub const AREA_PATH: &str = "System.AreaPath";
    pub const ITERATION_PATH: &str = "System.IterationPath";
    pub const WORK_ITEM_TYPE: &str = "System.WorkItemType";
    pub const TITLE: &str = "System.Title";
    pub const DESCRIPTION: &str = "System.Description";
    pub const STATE: &str = "System.State";
    pub const CREATED_DATE: &str = "System.CreatedDate";
    pub const CREATED_BY: &str = "System.CreatedBy";
    pub const CHANGED_DATE: &str = "System.ChangedDate";
    pub const CHANGED_BY: &str = "System.ChangedBy";
    pub const ASSIGNED_TO: &str = "System.AssignedTo";
    pub const HISTORY: &str = "System.History";
    pub const PRIORITY: &str = "Microsoft.VSTS.Common.Priority";
    pub const ACCEPTANCE_CRITERIA: &str = "Microsoft.VSTS.Common.AcceptanceCriteria";
    pub const REPRO_STEPS: &str = "Microsoft.VSTS.TCM.ReproSteps";
}

pub mod relations {
    pub const HIERARCHY_REVERSE: &str = "System.LinkTypes.Hierarchy-Reverse";
    pub const RELATED: &str = "System.LinkTypes.Related";
    pub const ATTACHED_FILE: &str = "AttachedFile";
}

const RELATIONS_APPEND: &str = "/relations/-";

/// A work item as returned by the destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: i64,
    #[serde(default)]
    pub rev: Option<i64>,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    #[serde(default)]
    pub url: Option<String>,
}

impl WorkItem {
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItemRelation {
    pub rel: String,
    pub url: String,
}

impl WorkItemRelation {
    pub fn new(rel: &str, url: impl Into<String>) -> Self {
        Self {
            rel: rel.to_string(),
            url: url.into(),
        }
    }
}

/// A JSON-Patch document describing a work item create or update.
///
/// Field paths are unique: setting a field twice replaces the earlier value.
/// Relation appends may repeat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatchDocument(Vec<PatchOperation>);

impl PatchDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        let path = format!("/fields/{name}");
        let value = value.into();
        match self.0.iter_mut().find(|op| op.path == path) {
            Some(existing) => existing.value = value,
            None => self.0.push(PatchOperation {
                op: PatchOp::Add,
                path,
                value,
            }),
        }
        self
    }

    pub fn add_relation(&mut self, relation: WorkItemRelation) -> &mut Self {
        self.0.push(PatchOperation {
            op: PatchOp::Add,
            path: RELATIONS_APPEND.to_string(),
            value: serde_json::json!({ "rel": relation.rel, "url": relation.url }),
        });
        self
    }

    pub fn extend(&mut self, other: PatchDocument) {
        for op in other.0 {
            if op.path == RELATIONS_APPEND {
                self.0.push(op);
            } else if let Some(name) = op.path.strip_prefix("/fields/") {
                let name = name.to_string();
                self.set_field(&name, op.value);
            } else {
                self.0.push(op);
            }
        }
    }

    #[cfg(test)]
    pub fn field(&self, name: &str) -> Option<&Value> {
        let path = format!("/fields/{name}");
        self.0.iter().find(|op| op.path == path).map(|op| &op.value)
    }

    #[cfg(test)]
    pub fn relations(&self) -> Vec<WorkItemRelation> {
        self.0
            .iter()
            .filter(|op| op.path == RELATIONS_APPEND)
            .filter_map(|op| serde_json::from_value(op.value.clone()).ok())
            .collect()
    }

    #[cfg(test)]
    pub fn operations(&self) -> &[PatchOperation] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamProject {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeStructureGroup {
    Iterations,
    Areas,
}

impl TreeStructureGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            TreeStructureGroup::Iterations => "Iterations",
            TreeStructureGroup::Areas => "Areas",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationNode {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentReference {
    pub id: String,
    pub url: String,
}
