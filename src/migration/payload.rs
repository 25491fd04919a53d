use chrono::{DateTime, SecondsFormat, Utc};

use super::translate::{resolve_priority, resolve_type, IdentityMap};
use crate::error::MappingError;
use crate::model::issue::{Comment, IssueType, SourceIssue};
use crate::model::work_item::{fields, relations, PatchDocument, WorkItemRelation};

/// Destination facts shared by every payload of a run.
pub struct PayloadContext<'a> {
    pub project_name: &'a str,
    /// Name of the destination's iteration root node, needed only when the issue has sprints.
    pub iteration_root: Option<&'a str>,
    /// Fallback creation date for issues without one.
    pub today: DateTime<Utc>,
}

pub fn build_payload(
    issue: &SourceIssue,
    ctx: &PayloadContext<'_>,
    identities: &IdentityMap,
) -> Result<PatchDocument, MappingError> {
    let work_item_type = resolve_type(&issue.issue_type)?;
    let reporter = identities.resolve(&issue.reporter)?;
    let description = issue.description.clone().unwrap_or_default();

    let mut doc = PatchDocument::new();
    doc.set_field(fields::TEAM_PROJECT, ctx.project_name)
        .set_field(fields::AREA_PATH, ctx.project_name)
        .set_field(fields::WORK_ITEM_TYPE, work_item_type)
        .set_field(
            fields::CREATED_DATE,
            format_date(issue.created.unwrap_or(ctx.today)),
        )
        .set_field(fields::CREATED_BY, reporter.clone())
        .set_field(fields::CHANGED_BY, reporter)
        .set_field(fields::TITLE, format!("{}: {}", issue.key, issue.summary))
        .set_field(fields::DESCRIPTION, description.clone())
        .set_field(fields::PRIORITY, resolve_priority(&issue.priority));

    // Created in its initial state; the mapped state follows as a separate update.
    if issue.issue_type.carries_state() {
        doc.set_field(fields::STATE, "New");
    }

    if issue.issue_type == IssueType::Bug {
        doc.set_field(fields::REPRO_STEPS, description);
    }

    if let (Some(sprints), Some(root)) = (issue.sprints(), ctx.iteration_root) {
        if let Some(current) = sprints.last() {
            doc.set_field(fields::ITERATION_PATH, format!("{root}\\{current}"));
        }
        if sprints.len() > 1 {
            doc.set_field(
                fields::ACCEPTANCE_CRITERIA,
                format!("Migration: {}", sprints.join("; ")),
            );
        }
    }

    if let Some(updated) = issue.updated {
        doc.set_field(fields::CHANGED_DATE, format_date(updated));
    }

    if let Some(assignee) = issue.assignee.as_deref().filter(|a| !a.is_empty()) {
        doc.set_field(fields::ASSIGNED_TO, identities.resolve(assignee)?);
    }

    Ok(doc)
}

pub fn state_patch(state: &str) -> PatchDocument {
    let mut doc = PatchDocument::new();
    doc.set_field(fields::STATE, state);
    doc
}

pub fn comment_patch(comment: &Comment, identities: &IdentityMap) -> Result<PatchDocument, MappingError> {
    let date = comment.created.map(format_date).unwrap_or_default();
    let mut doc = PatchDocument::new();
    doc.set_field(
        fields::HISTORY,
        format!(
            "[Migration (Author: {}; Date: {date})]: {}",
            comment.author, comment.body
        ),
    );

    if !comment.author.is_empty() {
        doc.set_field(fields::CREATED_BY, identities.resolve(&comment.author)?);
    }
    if comment.created.is_some() {
        doc.set_field(fields::CREATED_DATE, date);
    }

    Ok(doc)
}

pub fn parent_relation(url: impl Into<String>) -> WorkItemRelation {
    WorkItemRelation::new(relations::HIERARCHY_REVERSE, url)
}

pub fn related_relation(url: impl Into<String>) -> WorkItemRelation {
    WorkItemRelation::new(relations::RELATED, url)
}

pub fn attachment_relation(url: impl Into<String>) -> WorkItemRelation {
    WorkItemRelation::new(relations::ATTACHED_FILE, url)
}

fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap, HashSet};

    use chrono::TimeZone;
    use serde_json::Value;

    use super::*;
    use crate::model::issue::SPRINT_FIELD;

    fn today() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn ctx(iteration_root: Option<&str>) -> PayloadContext<'_> {
        PayloadContext {
            project_name: "Platform",
            iteration_root,
            today: today(),
        }
    }

    fn issue(key: &str, issue_type: IssueType) -> SourceIssue {
        SourceIssue {
            key: key.into(),
            issue_type,
            summary: "Login fails".into(),
            description: None,
            reporter: String::new(),
            assignee: None,
            priority: "High".into(),
            status_id: "1".into(),
            created: None,
            updated: None,
            parent_key: None,
            custom_fields: BTreeMap::new(),
        }
    }

    fn text(doc: &PatchDocument, name: &str) -> Option<String> {
        doc.field(name).and_then(Value::as_str).map(String::from)
    }

    #[test]
    fn required_fields_are_populated() {
        let doc = build_payload(&issue("SCP-1", IssueType::Story), &ctx(None), &IdentityMap::default())
            .unwrap();

        assert_eq!(text(&doc, fields::TEAM_PROJECT).as_deref(), Some("Platform"));
        assert_eq!(text(&doc, fields::AREA_PATH).as_deref(), Some("Platform"));
        assert_eq!(text(&doc, fields::WORK_ITEM_TYPE).as_deref(), Some("User Story"));
        assert_eq!(text(&doc, fields::TITLE).as_deref(), Some("SCP-1: Login fails"));
        assert_eq!(text(&doc, fields::DESCRIPTION).as_deref(), Some(""));
        assert_eq!(text(&doc, fields::CREATED_DATE).as_deref(), Some("2024-03-01T00:00:00Z"));
        assert_eq!(text(&doc, fields::CREATED_BY).as_deref(), Some(""));
        assert_eq!(doc.field(fields::PRIORITY), Some(&Value::from(2)));
        assert!(doc.field(fields::STATE).is_none());
        assert!(doc.field(fields::REPRO_STEPS).is_none());
        assert!(doc.field(fields::CHANGED_DATE).is_none());
        assert!(doc.field(fields::ASSIGNED_TO).is_none());
    }

    #[test]
    fn bug_gets_initial_state_and_repro_steps() {
        let mut bug = issue("SCP-2", IssueType::Bug);
        bug.description = Some("Click login twice".into());

        let doc = build_payload(&bug, &ctx(None), &IdentityMap::default()).unwrap();
        assert_eq!(text(&doc, fields::STATE).as_deref(), Some("New"));
        assert_eq!(text(&doc, fields::REPRO_STEPS).as_deref(), Some("Click login twice"));
        assert_eq!(text(&doc, fields::DESCRIPTION).as_deref(), Some("Click login twice"));
    }

    #[test]
    fn sprint_history_sets_iteration_and_acceptance_criteria() {
        let mut task = issue("SCP-3", IssueType::Task);
        task.custom_fields.insert(
            SPRINT_FIELD.into(),
            vec!["Sprint 1".into(), "Sprint 2".into(), "Sprint 3".into()],
        );

        let doc = build_payload(&task, &ctx(Some("Platform")), &IdentityMap::default()).unwrap();
        assert_eq!(
            text(&doc, fields::ITERATION_PATH).as_deref(),
            Some("Platform\\Sprint 3")
        );
        assert_eq!(
            text(&doc, fields::ACCEPTANCE_CRITERIA).as_deref(),
            Some("Migration: Sprint 1; Sprint 2; Sprint 3")
        );
    }

    #[test]
    fn single_sprint_has_no_acceptance_criteria() {
        let mut task = issue("SCP-4", IssueType::Task);
        task.custom_fields
            .insert(SPRINT_FIELD.into(), vec!["Sprint 7".into()]);

        let doc = build_payload(&task, &ctx(Some("Root")), &IdentityMap::default()).unwrap();
        assert_eq!(text(&doc, fields::ITERATION_PATH).as_deref(), Some("Root\\Sprint 7"));
        assert!(doc.field(fields::ACCEPTANCE_CRITERIA).is_none());
    }

    #[test]
    fn dates_and_assignee_are_translated() {
        let identities = IdentityMap::new(HashMap::from([
            ("alice".to_string(), "alice@corp.example".to_string()),
            ("bob".to_string(), "bob@corp.example".to_string()),
        ]));
        let mut story = issue("SCP-5", IssueType::Story);
        story.reporter = "alice".into();
        story.assignee = Some("bob".into());
        story.created = Some(Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap());
        story.updated = Some(Utc.with_ymd_and_hms(2021, 6, 7, 8, 9, 10).unwrap());

        let doc = build_payload(&story, &ctx(None), &identities).unwrap();
        assert_eq!(text(&doc, fields::CREATED_BY).as_deref(), Some("alice@corp.example"));
        assert_eq!(text(&doc, fields::CHANGED_BY).as_deref(), Some("alice@corp.example"));
        assert_eq!(text(&doc, fields::ASSIGNED_TO).as_deref(), Some("bob@corp.example"));
        assert_eq!(text(&doc, fields::CREATED_DATE).as_deref(), Some("2020-01-02T03:04:05Z"));
        assert_eq!(text(&doc, fields::CHANGED_DATE).as_deref(), Some("2021-06-07T08:09:10Z"));
    }

    #[test]
    fn unmapped_reporter_fails_the_payload() {
        let mut story = issue("SCP-6", IssueType::Story);
        story.reporter = "mallory".into();
        let err = build_payload(&story, &ctx(None), &IdentityMap::default()).unwrap_err();
        assert_eq!(err, MappingError::UnknownUser("mallory".into()));
    }

    #[test]
    fn unknown_type_fails_the_payload() {
        let improvement = issue("SCP-7", IssueType::from_name("Improvement"));
        assert!(matches!(
            build_payload(&improvement, &ctx(None), &IdentityMap::default()),
            Err(MappingError::UnknownType(_))
        ));
    }

    #[test]
    fn payload_field_paths_are_unique() {
        let mut bug = issue("SCP-8", IssueType::Bug);
        bug.description = Some("desc".into());
        bug.updated = Some(today());
        bug.custom_fields
            .insert(SPRINT_FIELD.into(), vec!["S1".into(), "S2".into()]);

        let doc = build_payload(&bug, &ctx(Some("Root")), &IdentityMap::default()).unwrap();
        let paths: HashSet<&str> = doc.operations().iter().map(|op| op.path.as_str()).collect();
        assert_eq!(paths.len(), doc.len());
    }

    #[test]
    fn comment_carries_author_and_date() {
        let identities = IdentityMap::new(HashMap::from([(
            "alice".to_string(),
            "alice@corp.example".to_string(),
        )]));
        let comment = Comment {
            body: "Looks good".into(),
            author: "alice".into(),
            created: Some(Utc.with_ymd_and_hms(2022, 5, 6, 7, 8, 9).unwrap()),
        };

        let doc = comment_patch(&comment, &identities).unwrap();
        assert_eq!(
            text(&doc, fields::HISTORY).as_deref(),
            Some("[Migration (Author: alice; Date: 2022-05-06T07:08:09Z)]: Looks good")
        );
        assert_eq!(text(&doc, fields::CREATED_BY).as_deref(), Some("alice@corp.example"));
        assert_eq!(text(&doc, fields::CREATED_DATE).as_deref(), Some("2022-05-06T07:08:09Z"));
    }

    #[test]
    fn anonymous_undated_comment_only_sets_history() {
        let comment = Comment {
            body: "ping".into(),
            author: String::new(),
            created: None,
        };
        let doc = comment_patch(&comment, &IdentityMap::default()).unwrap();
        assert_eq!(doc.len(), 1);
        assert_eq!(
            text(&doc, fields::HISTORY).as_deref(),
            Some("[Migration (Author: ; Date: )]: ping")
        );
    }
}
