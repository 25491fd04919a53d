use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use super::WorkItemDestination;
use crate::config::{AzureConfig, HttpConfig};
use crate::model::work_item::{
    AttachmentReference, ClassificationNode, PatchDocument, TeamProject, TreeStructureGroup,
    WorkItem,
};

const API_VERSION: &str = "7.0";
const JSON_PATCH: &str = "application/json-patch+json";

/// Azure DevOps (formerly VSTS) work item tracking.
pub struct AzureDevOps {
    base_url: String,
    auth_header: String,
    client: reqwest::Client,
}

impl AzureDevOps {
    pub fn new(config: &AzureConfig, http: &HttpConfig) -> Result<Self> {
        // PATs authenticate as basic auth with an empty user name.
        let encoded = base64::engine::general_purpose::STANDARD.encode(format!(":{}", config.pat));
        let client = reqwest::Client::builder()
            .user_agent("work-migrate")
            .timeout(Duration::from_secs(http.timeout_secs))
            .build()
            .context("Failed to build Azure DevOps HTTP client")?;
        Ok(Self {
            base_url: config.base_url()?,
            auth_header: format!("Basic {encoded}"),
            client,
        })
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder, what: &str) -> Result<T> {
        let resp = request
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Azure DevOps request failed: {what}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Azure DevOps returned {status} for {what}: {}", service_message(&body));
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse Azure DevOps response for {what}"))
    }

    fn project_url(&self, project: &str, rest: &str) -> String {
        format!(
            "{}/{}/_apis/{rest}",
            self.base_url,
            urlencoding::encode(project)
        )
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Azure DevOps wraps validation failures in `{"message": ...}`.
fn service_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| body.to_string())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WiqlResponse {
    #[serde(default)]
    work_items: Vec<WorkItemReference>,
}

#[derive(Deserialize)]
struct WorkItemReference {
    id: i64,
}

#[async_trait]
impl WorkItemDestination for AzureDevOps {
    fn name(&self) -> &str {
        "Azure DevOps"
    }

    fn work_item_url(&self, id: i64) -> String {
        format!("{}/_apis/wit/workItems/{id}", self.base_url)
    }

    async fn get_project(&self, project: &str) -> Result<TeamProject> {
        let url = format!(
            "{}/_apis/projects/{}?api-version={API_VERSION}",
            self.base_url,
            urlencoding::encode(project)
        );
        self.send(self.client.get(url), "get project").await
    }

    async fn create_work_item(
        &self,
        project: &str,
        work_item_type: &str,
        document: &PatchDocument,
    ) -> Result<WorkItem> {
        let url = self.project_url(
            project,
            &format!(
                "wit/workitems/${}?bypassRules=true&api-version={API_VERSION}",
                urlencoding::encode(work_item_type)
            ),
        );
        let request = self
            .client
            .post(url)
            .header("Content-Type", JSON_PATCH)
            .body(serde_json::to_vec(document)?);
        self.send(request, "create work item").await
    }

    async fn update_work_item(&self, id: i64, document: &PatchDocument) -> Result<WorkItem> {
        if document.is_empty() {
            bail!("Nothing to update on work item {id}");
        }
        let url = format!(
            "{}/_apis/wit/workitems/{id}?bypassRules=true&api-version={API_VERSION}",
            self.base_url
        );
        let request = self
            .client
            .patch(url)
            .header("Content-Type", JSON_PATCH)
            .body(serde_json::to_vec(document)?);
        self.send(request, "update work item").await
    }

    async fn get_classification_node(
        &self,
        project: &str,
        group: TreeStructureGroup,
    ) -> Result<ClassificationNode> {
        let url = self.project_url(
            project,
            &format!(
                "wit/classificationnodes/{}?$depth=10&api-version={API_VERSION}",
                group.as_str()
            ),
        );
        self.send(self.client.get(url), "get classification node").await
    }

    async fn create_attachment(
        &self,
        project: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<AttachmentReference> {
        let url = self.project_url(
            project,
            &format!(
                "wit/attachments?fileName={}&api-version={API_VERSION}",
                urlencoding::encode(file_name)
            ),
        );
        let request = self
            .client
            .post(url)
            .header("Content-Type", "application/octet-stream")
            .body(content);
        self.send(request, "create attachment").await
    }

    async fn get_work_item(&self, id: i64) -> Result<WorkItem> {
        let url = format!(
            "{}/_apis/wit/workitems/{id}?api-version={API_VERSION}",
            self.base_url
        );
        self.send(self.client.get(url), "get work item").await
    }

    async fn query_by_type(
        &self,
        project: &str,
        work_item_type: &str,
        project_name: &str,
    ) -> Result<Vec<i64>> {
        let query = format!(
            "SELECT [System.Id], [System.Title] FROM WorkItems WHERE [System.WorkItemType] = '{}' AND [System.TeamProject] = '{}'",
            work_item_type.replace('\'', "''"),
            project_name.replace('\'', "''")
        );
        let url = self.project_url(project, &format!("wit/wiql?api-version={API_VERSION}"));
        let request = self
            .client
            .post(url)
            .json(&serde_json::json!({ "query": query }));
        let result: WiqlResponse = self.send(request, "query work items").await?;
        Ok(result.work_items.into_iter().map(|r| r.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::work_item::fields;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn destination(base_url: &str) -> AzureDevOps {
        let config = AzureConfig {
            base_url: Some(base_url.to_string()),
            organization: None,
            project: "Platform".into(),
            pat: "pat".into(),
        };
        AzureDevOps::new(&config, &HttpConfig::default()).unwrap()
    }

    #[test]
    fn work_item_url_points_at_the_organization_api() {
        let ado = destination("https://dev.azure.com/acme");
        assert_eq!(
            ado.work_item_url(42),
            "https://dev.azure.com/acme/_apis/wit/workItems/42"
        );
    }

    #[tokio::test]
    async fn create_work_item_posts_json_patch() {
        let server = MockServer::start().await;
        let mut doc = PatchDocument::new();
        doc.set_field(fields::TITLE, "SCP-1: Login fails");

        Mock::given(method("POST"))
            .and(path("/Platform/_apis/wit/workitems/$User%20Story"))
            .and(query_param("bypassRules", "true"))
            .and(header("Authorization", "Basic OnBhdA=="))
            .and(header("Content-Type", JSON_PATCH))
            .and(body_json(serde_json::json!([
                { "op": "add", "path": "/fields/System.Title", "value": "SCP-1: Login fails" }
            ])))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 101,
                "rev": 1,
                "fields": { "System.Title": "SCP-1: Login fails" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let item = destination(&server.uri())
            .create_work_item("Platform", "User Story", &doc)
            .await
            .unwrap();
        assert_eq!(item.id, 101);
        assert_eq!(item.field_str(fields::TITLE), Some("SCP-1: Login fails"));
    }

    #[tokio::test]
    async fn validation_failure_surfaces_service_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "message": "TF401320: Rule Error for field Title."
            })))
            .mount(&server)
            .await;

        let err = destination(&server.uri())
            .create_work_item("Platform", "Bug", &PatchDocument::new())
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("400"));
        assert!(message.contains("TF401320"));
    }

    #[tokio::test]
    async fn update_work_item_patches_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/_apis/wit/workitems/7"))
            .and(body_string_contains("System.State"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": 7, "rev": 2 })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut doc = PatchDocument::new();
        doc.set_field(fields::STATE, "Active");
        let item = destination(&server.uri()).update_work_item(7, &doc).await.unwrap();
        assert_eq!(item.rev, Some(2));
    }

    #[tokio::test]
    async fn empty_update_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = destination(&server.uri())
            .update_work_item(7, &PatchDocument::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Nothing to update"));
    }

    #[tokio::test]
    async fn attachment_upload_returns_blob_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Platform/_apis/wit/attachments"))
            .and(query_param("fileName", "trace log.txt"))
            .and(header("Content-Type", "application/octet-stream"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "a1",
                "url": "https://dev.azure.com/acme/_apis/wit/attachments/a1"
            })))
            .mount(&server)
            .await;

        let reference = destination(&server.uri())
            .create_attachment("Platform", "trace log.txt", b"data".to_vec())
            .await
            .unwrap();
        assert_eq!(reference.url, "https://dev.azure.com/acme/_apis/wit/attachments/a1");
    }

    #[tokio::test]
    async fn metadata_lookups() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_apis/projects/Platform"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "0f4c", "name": "Platform", "state": "wellFormed"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/Platform/_apis/wit/classificationnodes/Iterations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 1, "name": "Platform", "structureType": "iteration"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/Platform/_apis/wit/wiql"))
            .and(body_string_contains("[System.WorkItemType] = 'Bug'"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "workItems": [{ "id": 3, "url": "u3" }, { "id": 5, "url": "u5" }]
            })))
            .mount(&server)
            .await;

        let ado = destination(&server.uri());
        assert_eq!(ado.get_project("Platform").await.unwrap().id, "0f4c");
        assert_eq!(
            ado.get_classification_node("Platform", TreeStructureGroup::Iterations)
                .await
                .unwrap()
                .name,
            "Platform"
        );
        assert_eq!(
            ado.query_by_type("Platform", "Bug", "Platform").await.unwrap(),
            vec![3, 5]
        );
    }
}
