use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use super::IssueSource;
use crate::config::{HttpConfig, JiraConfig};
use crate::model::issue::{
    Attachment, Comment, IssueLink, IssueType, SourceIssue, SourceProject, SPRINT_FIELD,
};
use crate::util::adf::extract_text_from_adf;

const ISSUE_FIELDS: &str =
    "summary,description,issuetype,status,priority,reporter,assignee,created,updated,parent";

pub struct JiraSource {
    base_url: String,
    auth_header: String,
    sprint_field: Option<String>,
    page_size: usize,
    client: reqwest::Client,
}

impl JiraSource {
    pub fn new(config: &JiraConfig, http: &HttpConfig) -> Result<Self> {
        let creds = format!("{}:{}", config.email, config.api_token);
        let encoded = base64::engine::general_purpose::STANDARD.encode(creds);
        let client = reqwest::Client::builder()
            .user_agent("work-migrate")
            .timeout(Duration::from_secs(http.timeout_secs))
            .build()
            .context("Failed to build Jira HTTP client")?;
        Ok(Self {
            base_url: config.base_url()?,
            auth_header: format!("Basic {encoded}"),
            sprint_field: config.sprint_field.clone(),
            page_size: http.page_size.max(1),
            client,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self
            .client
            .get(url)
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Jira API request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Jira API returned {status} for {url}: {body}");
        }

        resp.json().await.context("Failed to parse Jira response")
    }

    fn search_fields(&self) -> String {
        match &self.sprint_field {
            Some(field) => format!("{ISSUE_FIELDS},{field}"),
            None => ISSUE_FIELDS.to_string(),
        }
    }

    fn convert_issue(&self, issue: JiraIssue) -> SourceIssue {
        let fields = issue.fields;
        let mut custom_fields = BTreeMap::new();
        if let Some(field) = &self.sprint_field {
            let sprints = fields
                .extra
                .get(field)
                .map(sprint_names)
                .unwrap_or_default();
            if !sprints.is_empty() {
                custom_fields.insert(SPRINT_FIELD.to_string(), sprints);
            }
        }

        SourceIssue {
            key: issue.key,
            issue_type: IssueType::from_name(
                fields.issuetype.as_ref().map(|t| t.name.as_str()).unwrap_or(""),
            ),
            summary: fields.summary.unwrap_or_default(),
            description: fields.description.as_ref().and_then(extract_text_from_adf),
            reporter: fields.reporter.map(JiraUser::identity).unwrap_or_default(),
            assignee: fields.assignee.map(JiraUser::identity),
            priority: fields.priority.map(|p| p.name).unwrap_or_default(),
            status_id: fields.status.map(|s| s.id).unwrap_or_default(),
            created: fields.created.as_deref().and_then(parse_jira_date),
            updated: fields.updated.as_deref().and_then(parse_jira_date),
            parent_key: fields.parent.map(|p| p.key),
            custom_fields,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    issues: Vec<JiraIssue>,
    #[serde(default)]
    total: usize,
}

#[derive(Deserialize)]
struct JiraIssue {
    key: String,
    fields: IssueFields,
}

#[derive(Deserialize)]
struct IssueFields {
    summary: Option<String>,
    description: Option<Value>,
    issuetype: Option<NamedField>,
    status: Option<StatusField>,
    priority: Option<NamedField>,
    reporter: Option<JiraUser>,
    assignee: Option<JiraUser>,
    created: Option<String>,
    updated: Option<String>,
    parent: Option<ParentField>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct NamedField {
    name: String,
}

#[derive(Deserialize)]
struct StatusField {
    id: String,
}

#[derive(Deserialize)]
struct ParentField {
    key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraUser {
    account_id: Option<String>,
    email_address: Option<String>,
    display_name: Option<String>,
}

impl JiraUser {
    /// Email when Jira exposes it, account id otherwise.
    fn identity(self) -> String {
        self.email_address
            .filter(|e| !e.is_empty())
            .or(self.account_id)
            .or(self.display_name)
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentPage {
    comments: Vec<JiraComment>,
    #[serde(default)]
    total: usize,
}

#[derive(Deserialize)]
struct JiraComment {
    body: Option<Value>,
    author: Option<JiraUser>,
    created: Option<String>,
}

#[derive(Deserialize)]
struct AttachmentFields {
    #[serde(default)]
    attachment: Vec<JiraAttachment>,
}

#[derive(Deserialize)]
struct JiraAttachment {
    id: String,
    filename: String,
    content: String,
    #[serde(default)]
    size: u64,
}

#[derive(Deserialize)]
struct LinkFields {
    #[serde(default)]
    issuelinks: Vec<JiraIssueLink>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraIssueLink {
    #[serde(rename = "type")]
    link_type: JiraLinkType,
    outward_issue: Option<ParentField>,
}

#[derive(Deserialize)]
struct JiraLinkType {
    outward: Option<String>,
    name: String,
}

#[derive(Deserialize)]
struct FieldsEnvelope<T> {
    fields: T,
}

#[derive(Deserialize)]
struct ProjectResponse {
    key: String,
    name: String,
    #[serde(default, rename = "issueTypes")]
    issue_types: Vec<NamedField>,
}

#[async_trait]
impl IssueSource for JiraSource {
    fn name(&self) -> &str {
        "Jira"
    }

    async fn list_issues(
        &self,
        project_key: &str,
        issue_type: Option<&IssueType>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<SourceIssue>> {
        let jql = match issue_type {
            Some(ty) => format!("project = \"{project_key}\" AND issuetype = \"{ty}\" ORDER BY created ASC"),
            None => format!("project = \"{project_key}\" ORDER BY created ASC"),
        };
        let fields = self.search_fields();

        let mut issues = Vec::new();
        let mut start_at = offset;
        while issues.len() < limit {
            let page_size = self.page_size.min(limit - issues.len());
            let url = format!(
                "{}/rest/api/3/search?jql={}&startAt={start_at}&maxResults={page_size}&fields={}",
                self.base_url,
                urlencoding::encode(&jql),
                urlencoding::encode(&fields)
            );
            let page: SearchResponse = self.get_json(&url).await?;
            let fetched = page.issues.len();
            debug!(start_at, fetched, total = page.total, "fetched Jira search page");

            issues.extend(page.issues.into_iter().map(|i| self.convert_issue(i)));
            start_at += fetched;
            // Jira may cap maxResults below what was asked, so only total ends paging.
            if fetched == 0 || start_at >= page.total {
                break;
            }
        }

        issues.truncate(limit);
        Ok(issues)
    }

    async fn get_comments(&self, issue_key: &str) -> Result<Vec<Comment>> {
        let mut comments = Vec::new();
        loop {
            let url = format!(
                "{}/rest/api/3/issue/{}/comment?startAt={}&maxResults={}&orderBy=created",
                self.base_url,
                urlencoding::encode(issue_key),
                comments.len(),
                self.page_size
            );
            let page: CommentPage = self.get_json(&url).await?;
            let fetched = page.comments.len();
            comments.extend(page.comments.into_iter().map(|c| Comment {
                body: c.body.as_ref().and_then(extract_text_from_adf).unwrap_or_default(),
                author: c.author.map(JiraUser::identity).unwrap_or_default(),
                created: c.created.as_deref().and_then(parse_jira_date),
            }));
            if fetched == 0 || comments.len() >= page.total {
                break;
            }
        }
        Ok(comments)
    }

    async fn get_attachments(&self, issue_key: &str) -> Result<Vec<Attachment>> {
        let url = format!(
            "{}/rest/api/3/issue/{}?fields=attachment",
            self.base_url,
            urlencoding::encode(issue_key)
        );
        let issue: FieldsEnvelope<AttachmentFields> = self.get_json(&url).await?;
        Ok(issue
            .fields
            .attachment
            .into_iter()
            .map(|a| Attachment {
                id: a.id,
                filename: a.filename,
                content_url: a.content,
                size: a.size,
            })
            .collect())
    }

    async fn download_attachment(&self, attachment: &Attachment) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(&attachment.content_url)
            .header("Authorization", &self.auth_header)
            .send()
            .await
            .with_context(|| format!("Failed to download attachment {}", attachment.filename))?;

        if !resp.status().is_success() {
            bail!(
                "Jira returned {} downloading attachment {}",
                resp.status(),
                attachment.filename
            );
        }

        let bytes = resp.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn get_links(&self, issue_key: &str) -> Result<Vec<IssueLink>> {
        let url = format!(
            "{}/rest/api/3/issue/{}?fields=issuelinks",
            self.base_url,
            urlencoding::encode(issue_key)
        );
        let issue: FieldsEnvelope<LinkFields> = self.get_json(&url).await?;
        Ok(issue
            .fields
            .issuelinks
            .into_iter()
            .filter_map(|link| {
                let target = link.outward_issue?;
                Some(IssueLink {
                    relation: link.link_type.outward.unwrap_or(link.link_type.name),
                    target_key: target.key,
                })
            })
            .collect())
    }

    async fn get_issue_types(&self, project_key: &str) -> Result<Vec<String>> {
        let project: ProjectResponse = self
            .get_json(&format!(
                "{}/rest/api/3/project/{}",
                self.base_url,
                urlencoding::encode(project_key)
            ))
            .await?;
        Ok(project.issue_types.into_iter().map(|t| t.name).collect())
    }

    async fn get_project(&self, project_key: &str) -> Result<SourceProject> {
        let project: ProjectResponse = self
            .get_json(&format!(
                "{}/rest/api/3/project/{}",
                self.base_url,
                urlencoding::encode(project_key)
            ))
            .await?;
        Ok(SourceProject {
            key: project.key,
            name: project.name,
        })
    }
}

/// Jira timestamps look like `2020-01-31T09:15:00.000+0100`.
fn parse_jira_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Sprint values come back either as objects with a `name` or, on older
/// servers, as serialized `...[id=1,name=Sprint 1,...]` strings.
fn sprint_names(value: &Value) -> Vec<String> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(String::from),
            Value::String(s) => Some(legacy_sprint_name(s).unwrap_or(s.as_str()).to_string()),
            _ => None,
        })
        .collect()
}

fn legacy_sprint_name(raw: &str) -> Option<&str> {
    let start = raw.find("name=")? + "name=".len();
    let rest = &raw[start..];
    let end = rest.find([',', ']']).unwrap_or(rest.len());
    Some(&rest[..end])
}
