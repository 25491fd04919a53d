use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::model::issue::IssueType;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub jira: JiraConfig,
    pub azure: AzureConfig,
    #[serde(default)]
    pub migration: MigrationConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    /// Source identity (email or account id) to destination identity.
    #[serde(default)]
    pub identities: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct JiraConfig {
    /// Full base URL; takes precedence over `domain`.
    pub base_url: Option<String>,
    pub domain: Option<String>,
    pub email: String,
    pub api_token: String,
    pub project_key: String,
    /// Custom field id holding sprints, e.g. `customfield_10020`.
    pub sprint_field: Option<String>,
}

impl JiraConfig {
    pub fn base_url(&self) -> Result<String> {
        match (&self.base_url, &self.domain) {
            (Some(url), _) => Ok(url.trim_end_matches('/').to_string()),
            (None, Some(domain)) => Ok(format!("https://{domain}.atlassian.net")),
            (None, None) => bail!("[jira] needs either base_url or domain"),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AzureConfig {
    /// Full organization URL; takes precedence over `organization`.
    pub base_url: Option<String>,
    pub organization: Option<String>,
    /// Project name or id work items are created in.
    pub project: String,
    pub pat: String,
}

impl AzureConfig {
    pub fn base_url(&self) -> Result<String> {
        match (&self.base_url, &self.organization) {
            (Some(url), _) => Ok(url.trim_end_matches('/').to_string()),
            (None, Some(org)) => Ok(format!("https://dev.azure.com/{org}")),
            (None, None) => bail!("[azure] needs either base_url or organization"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Issue type names, migrated in this order.
    pub batches: Vec<String>,
    pub max_issues: usize,
    pub link_related: bool,
    pub skip_failed_attachments: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batches: IssueType::BATCH_ORDER
                .iter()
                .map(|t| t.as_str().to_string())
                .collect(),
            max_issues: usize::MAX,
            link_related: true,
            skip_failed_attachments: false,
        }
    }
}

impl MigrationConfig {
    pub fn batch_types(&self) -> Vec<IssueType> {
        self.batches.iter().map(|b| IssueType::from_name(b)).collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub page_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            page_size: 100,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct JournalConfig {
    #[serde(default)]
    pub enabled: bool,
}

pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".work-migrate")
}

fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
    if !path.exists() {
        bail!(
            "No config found at {}. Create it with [jira] and [azure] sections.",
            path.display()
        );
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents)?;
    config.jira.base_url()?;
    config.azure.base_url()?;
    if config.http.page_size == 0 {
        bail!("[http] page_size must be greater than zero");
    }
    Ok(config)
}
