use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveTime, Utc};
use tracing::{debug, error, info, warn};

use super::hierarchy::HierarchyTracker;
use super::payload::{
    attachment_relation, build_payload, comment_patch, parent_relation, related_relation,
    state_patch, PayloadContext,
};
use super::report::{BatchReport, IssueOutcome};
use super::translate::{resolve_state, resolve_type, IdentityMap};
use crate::config::MigrationConfig;
use crate::model::issue::SourceIssue;
use crate::model::work_item::{PatchDocument, TeamProject, TreeStructureGroup, WorkItemRelation};
use crate::providers::{IssueSource, WorkItemDestination};

#[derive(Debug, Clone, Copy)]
pub struct MigrationOptions {
    /// Turn outward links to already-migrated issues into related links.
    pub link_related: bool,
    /// Log and drop failed attachments instead of failing the whole issue.
    pub skip_failed_attachments: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            link_related: true,
            skip_failed_attachments: false,
        }
    }
}

impl From<&MigrationConfig> for MigrationOptions {
    fn from(config: &MigrationConfig) -> Self {
        Self {
            link_related: config.link_related,
            skip_failed_attachments: config.skip_failed_attachments,
        }
    }
}

/// Migrates batches of source issues into one destination project.
///
/// One `Migrator` covers a whole run: parents recorded while migrating an
/// earlier batch stay linkable from later batches. Issues are processed
/// strictly one after another so a parent is always recorded before any
/// child that follows it.
pub struct Migrator<'a> {
    source: &'a dyn IssueSource,
    destination: &'a dyn WorkItemDestination,
    project: TeamProject,
    identities: IdentityMap,
    options: MigrationOptions,
    hierarchy: HierarchyTracker,
    /// Every issue created in this run, parented or not.
    created: HashMap<String, i64>,
    iteration_root: Option<String>,
}

impl<'a> Migrator<'a> {
    pub async fn connect(
        source: &'a dyn IssueSource,
        destination: &'a dyn WorkItemDestination,
        project: &str,
        identities: IdentityMap,
        options: MigrationOptions,
    ) -> Result<Migrator<'a>> {
        let project = destination
            .get_project(project)
            .await
            .with_context(|| format!("Failed to look up destination project {project}"))?;
        info!(
            source = source.name(),
            destination = destination.name(),
            project = %project.name,
            "connected"
        );

        Ok(Self {
            source,
            destination,
            project,
            identities,
            options,
            hierarchy: HierarchyTracker::new(),
            created: HashMap::new(),
            iteration_root: None,
        })
    }

    #[cfg(test)]
    pub fn hierarchy(&self) -> &HierarchyTracker {
        &self.hierarchy
    }

    /// Migrate `issues` in order. Never fails: every per-issue error is
    /// logged and recorded in the returned report.
    pub async fn migrate(&mut self, batch: &str, issues: &[SourceIssue]) -> BatchReport {
        let mut report = BatchReport::new(batch, issues.len());
        info!(batch, count = issues.len(), "Count for migration: {}", issues.len());

        for issue in issues {
            match self.migrate_issue(issue, &mut report).await {
                Ok(id) => {
                    report.record(IssueOutcome::Created {
                        key: issue.key.clone(),
                        id,
                    });
                    info!(
                        key = %issue.key,
                        id,
                        remaining = report.remaining(),
                        "Issue was migrated"
                    );
                }
                Err(e) => {
                    error!(key = %issue.key, "Error: Item[{}] - {e:#}", issue.key);
                    report.record(IssueOutcome::Failed {
                        key: issue.key.clone(),
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        report
    }

    async fn migrate_issue(&mut self, issue: &SourceIssue, report: &mut BatchReport) -> Result<i64> {
        let mut document = self.build_document(issue).await?;

        if let Some(link) = self.hierarchy.resolve_parent_link(&issue.key, issue.parent()) {
            document.add_relation(parent_relation(
                self.destination.work_item_url(link.parent_id),
            ));
        } else if let Some(parent) = issue.parent() {
            debug!(key = %issue.key, parent, "parent not migrated in this run, link dropped");
        }

        if self.options.link_related {
            for relation in self.related_links(issue).await {
                document.add_relation(relation);
            }
        }

        let attachments = self.upload_attachments(issue, report).await?;
        document.extend(attachments);

        let work_item_type = resolve_type(&issue.issue_type)?;
        debug!(key = %issue.key, work_item_type, operations = document.len(), "creating work item");
        let item = self
            .destination
            .create_work_item(&self.project.name, work_item_type, &document)
            .await?;

        if issue.issue_type.carries_state() {
            self.update_state(item.id, issue, report).await;
        }

        if issue.parent().is_none() {
            self.hierarchy.record_root(&issue.key, item.id);
        }
        self.created.insert(issue.key.clone(), item.id);

        self.migrate_comments(item.id, issue, report).await;

        Ok(item.id)
    }

    async fn build_document(&mut self, issue: &SourceIssue) -> Result<PatchDocument> {
        let iteration_root = match issue.sprints() {
            Some(_) => Some(self.iteration_root().await?),
            None => None,
        };
        let ctx = PayloadContext {
            project_name: &self.project.name,
            iteration_root: iteration_root.as_deref(),
            today: today(),
        };
        Ok(build_payload(issue, &ctx, &self.identities)?)
    }

    async fn iteration_root(&mut self) -> Result<String> {
        if let Some(root) = &self.iteration_root {
            return Ok(root.clone());
        }
        let node = self
            .destination
            .get_classification_node(&self.project.name, TreeStructureGroup::Iterations)
            .await
            .context("Failed to look up the iteration root")?;
        self.iteration_root = Some(node.name.clone());
        Ok(node.name)
    }

    /// Related links are optional: a failed lookup leaves the item without them.
    async fn related_links(&self, issue: &SourceIssue) -> Vec<WorkItemRelation> {
        let links = match self.source.get_links(&issue.key).await {
            Ok(links) => links,
            Err(e) => {
                warn!(key = %issue.key, "could not read links, creating without them: {e:#}");
                return Vec::new();
            }
        };

        links
            .into_iter()
            .filter_map(|link| match self.created.get(&link.target_key) {
                Some(id) => Some(related_relation(self.destination.work_item_url(*id))),
                None => {
                    debug!(
                        key = %issue.key,
                        target = %link.target_key,
                        relation = %link.relation,
                        "link target not migrated yet, skipped"
                    );
                    None
                }
            })
            .collect()
    }

    async fn upload_attachments(
        &self,
        issue: &SourceIssue,
        report: &mut BatchReport,
    ) -> Result<PatchDocument> {
        let attachments = self
            .source
            .get_attachments(&issue.key)
            .await
            .with_context(|| format!("Failed to list attachments of {}", issue.key))?;

        let mut document = PatchDocument::new();
        for attachment in &attachments {
            let uploaded = async {
                let bytes = self.source.download_attachment(attachment).await?;
                self.destination
                    .create_attachment(&self.project.name, &attachment.filename, bytes)
                    .await
            }
            .await
            .with_context(|| format!("Failed to copy attachment {}", attachment.filename));

            match uploaded {
                Ok(reference) => {
                    document.add_relation(attachment_relation(reference.url));
                    report.attachments_uploaded += 1;
                }
                Err(e) if self.options.skip_failed_attachments => {
                    warn!(key = %issue.key, "{e:#}, skipping");
                    report.attachments_skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(document)
    }

    /// State changes are a follow-up update; failures leave the created item as is.
    async fn update_state(&self, id: i64, issue: &SourceIssue, report: &mut BatchReport) {
        let state = match resolve_state(&issue.status_id, &issue.issue_type) {
            Ok(state) => state,
            Err(e) => {
                error!(key = %issue.key, id, "Error: Update state destination Id: {id}. Message: {e}");
                report.state_update_failures += 1;
                return;
            }
        };

        match self.destination.update_work_item(id, &state_patch(state)).await {
            Ok(_) => info!(key = %issue.key, id, state, "Update state"),
            Err(e) => {
                error!(key = %issue.key, id, "Error: Update state destination Id: {id}. Message: {e:#}");
                report.state_update_failures += 1;
            }
        }
    }

    async fn migrate_comments(&self, id: i64, issue: &SourceIssue, report: &mut BatchReport) {
        let comments = match self.source.get_comments(&issue.key).await {
            Ok(comments) => comments,
            Err(e) => {
                error!(key = %issue.key, id, "Error: could not read comments: {e:#}");
                return;
            }
        };

        for comment in &comments {
            let result = match comment_patch(comment, &self.identities) {
                Ok(patch) => self.destination.update_work_item(id, &patch).await.map(|_| ()),
                Err(e) => Err(e.into()),
            };
            match result {
                Ok(()) => report.comments_migrated += 1,
                Err(e) => {
                    error!(
                        key = %issue.key,
                        id,
                        "Error: Add comment of {} to destination {id}. Message: {e:#}",
                        issue.key
                    );
                    report.comments_failed += 1;
                }
            }
        }
    }
}

fn today() -> DateTime<Utc> {
    Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc()
}
