//! GitHub GraphQL 客户端

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::auditlog::{AuditLogPage, AuditLogSource, AUDIT_LOG_QUERY, PAGE_SIZE};
use crate::config::GitHubSettings;

const USER_AGENT: &str = concat!("github-auditor/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: AuditLogVariables<'a>,
}

/// `after` 必须序列化为 null，不能省略
#[derive(Debug, Serialize)]
struct AuditLogVariables<'a> {
    login: &'a str,
    after: Option<&'a str>,
    first: u32,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<AuditLogData>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct AuditLogData {
    organization: Option<OrganizationData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrganizationData {
    audit_log: AuditLogPage,
}

/// GitHub GraphQL 客户端（阻塞）
#[derive(Debug)]
pub struct GitHubClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    token: String,
}

impl GitHubClient {
    pub fn new(settings: &GitHubSettings) -> Result<Self> {
        if settings.token.is_empty() {
            return Err(anyhow!("GitHub token is required"));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| anyhow!("Cannot create HTTP client: {}", e))?;

        Ok(Self {
            client,
            endpoint: settings.graphql_url.clone(),
            token: settings.token.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl AuditLogSource for GitHubClient {
    fn fetch_page(&self, login: &str, after: Option<&str>) -> Result<AuditLogPage> {
        let request = GraphQlRequest {
            query: AUDIT_LOG_QUERY,
            variables: AuditLogVariables {
                login,
                after,
                first: PAGE_SIZE,
            },
        };

        debug!(endpoint = %self.endpoint, organisation = %login, after = ?after, "Querying audit log");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .context("GitHub GraphQL request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(anyhow!("GitHub GraphQL returned {}: {}", status, body.trim()));
        }

        let envelope: GraphQlResponse = response
            .json()
            .context("Invalid GitHub GraphQL response")?;

        if let Some(errors) = envelope.errors.filter(|errors| !errors.is_empty()) {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(anyhow!("GitHub GraphQL errors: {}", messages.join("; ")));
        }

        envelope
            .data
            .and_then(|data| data.organization)
            .map(|org| org.audit_log)
            .ok_or_else(|| anyhow!("Organisation '{}' not found or not accessible", login))
    }
}
