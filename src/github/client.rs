//! GitHub REST API client.

use super::{CodeFrequency, CodeFrequencyWeek, CommitItem, IssueItem, PullItem, RepoStats};
use crate::config::GithubConfig;
use crate::error::{Error, Result};
use crate::models::DateWindow;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Client for the subset of the GitHub API the aggregator needs.
pub struct GithubClient {
    http_client: reqwest::Client,
    api_url: String,
    per_page: u32,
}

impl GithubClient {
    pub fn new(config: &GithubConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("autorf/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static("2022-11-28"));

        if let Some(ref token) = config.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| Error::Validation("GitHub token contains invalid characters".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            http_client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            per_page: config.per_page,
        })
    }

    fn repo_url(&self, owner: &str, repo: &str, path: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_url, owner, repo, path)
    }

    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Response> {
        debug!("GET {} {:?}", url, query);
        let response = self.http_client.get(url).query(query).send().await?;
        Ok(response)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        url: &str,
        mut query: Vec<(&str, String)>,
        page: u32,
    ) -> Result<Vec<T>> {
        query.push(("per_page", self.per_page.to_string()));
        query.push(("page", page.to_string()));

        let response = self.get(url, &query).await?;
        match response.status() {
            // Empty repositories answer 409 on listings.
            StatusCode::CONFLICT => Ok(Vec::new()),
            status if status.is_success() => Ok(response.json().await?),
            _ => Err(api_error(url, response).await),
        }
    }
}

fn timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

async fn api_error(url: &str, response: Response) -> Error {
    let status = response.status();
    let remaining = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let body = response.text().await.unwrap_or_default();

    if matches!(status, StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS)
        && remaining.as_deref() == Some("0")
    {
        return Error::Github(format!("rate limit exceeded for {}", url));
    }

    Error::Github(format!("{} for {}: {}", status, url, body))
}

/// Interpret a code frequency body; anything but a list means "not ready".
fn parse_code_frequency(body: Value) -> Result<CodeFrequency> {
    if !body.is_array() {
        return Ok(CodeFrequency::Pending);
    }
    let weeks: Vec<CodeFrequencyWeek> = serde_json::from_value(body)?;
    Ok(CodeFrequency::Ready(weeks))
}

#[async_trait]
impl RepoStats for GithubClient {
    fn per_page(&self) -> u32 {
        self.per_page
    }

    async fn list_commits(
        &self,
        owner: &str,
        repo: &str,
        window: &DateWindow,
        page: u32,
    ) -> Result<Vec<CommitItem>> {
        let url = self.repo_url(owner, repo, "commits");
        let query = vec![
            ("since", timestamp(window.from)),
            ("until", timestamp(window.to)),
        ];
        self.get_page(&url, query, page).await
    }

    async fn list_issues(
        &self,
        owner: &str,
        repo: &str,
        since: DateTime<Utc>,
        page: u32,
    ) -> Result<Vec<IssueItem>> {
        let url = self.repo_url(owner, repo, "issues");
        let query = vec![("state", "all".to_string()), ("since", timestamp(since))];
        self.get_page(&url, query, page).await
    }

    async fn list_pulls(&self, owner: &str, repo: &str, page: u32) -> Result<Vec<PullItem>> {
        let url = self.repo_url(owner, repo, "pulls");
        let query = vec![
            ("state", "all".to_string()),
            ("sort", "created".to_string()),
            ("direction", "desc".to_string()),
        ];
        self.get_page(&url, query, page).await
    }

    async fn code_frequency(&self, owner: &str, repo: &str) -> Result<CodeFrequency> {
        let url = self.repo_url(owner, repo, "stats/code_frequency");
        let response = self.get(&url, &[]).await?;

        match response.status() {
            StatusCode::ACCEPTED => Ok(CodeFrequency::Pending),
            StatusCode::NO_CONTENT => Ok(CodeFrequency::Ready(Vec::new())),
            status if status.is_success() => parse_code_frequency(response.json().await?),
            _ => Err(api_error(&url, response).await),
        }
    }
}
