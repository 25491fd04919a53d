pub mod azure;
pub mod jira;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::AppConfig;
use crate::model::issue::{Attachment, Comment, IssueLink, IssueType, SourceIssue, SourceProject};
use crate::model::work_item::{
    AttachmentReference, ClassificationNode, PatchDocument, TeamProject, TreeStructureGroup,
    WorkItem,
};

/// Read side of a migration: the tracker issues come from.
#[async_trait]
pub trait IssueSource: Send + Sync {
    fn name(&self) -> &str;
    /// Issues of a project ordered by creation time, oldest first.
    async fn list_issues(
        &self,
        project_key: &str,
        issue_type: Option<&IssueType>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<SourceIssue>>;
    async fn get_comments(&self, issue_key: &str) -> Result<Vec<Comment>>;
    async fn get_attachments(&self, issue_key: &str) -> Result<Vec<Attachment>>;
    async fn download_attachment(&self, attachment: &Attachment) -> Result<Vec<u8>>;
    async fn get_links(&self, issue_key: &str) -> Result<Vec<IssueLink>>;
    async fn get_issue_types(&self, project_key: &str) -> Result<Vec<String>>;
    async fn get_project(&self, project_key: &str) -> Result<SourceProject>;
}

/// Write side of a migration: the tracker work items are created in.
#[async_trait]
pub trait WorkItemDestination: Send + Sync {
    fn name(&self) -> &str;
    /// URL other work items use to reference item `id` in relations.
    fn work_item_url(&self, id: i64) -> String;
    async fn get_project(&self, project: &str) -> Result<TeamProject>;
    async fn create_work_item(
        &self,
        project: &str,
        work_item_type: &str,
        document: &PatchDocument,
    ) -> Result<WorkItem>;
    async fn update_work_item(&self, id: i64, document: &PatchDocument) -> Result<WorkItem>;
    async fn get_classification_node(
        &self,
        project: &str,
        group: TreeStructureGroup,
    ) -> Result<ClassificationNode>;
    async fn create_attachment(
        &self,
        project: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<AttachmentReference>;
    async fn get_work_item(&self, id: i64) -> Result<WorkItem>;
    async fn query_by_type(
        &self,
        project: &str,
        work_item_type: &str,
        project_name: &str,
    ) -> Result<Vec<i64>>;
}


pub fn create_source(config: &AppConfig) -> Result<Box<dyn IssueSource>> {
    Ok(Box::new(jira::JiraSource::new(&config.jira, &config.http)?))
}

pub fn create_destination(config: &AppConfig) -> Result<Box<dyn WorkItemDestination>> {
    Ok(Box::new(azure::AzureDevOps::new(&config.azure, &config.http)?))
}
