//! Repository statistics collaborator.
//!
//! [`RepoStats`] is the seam the metrics aggregator reads GitHub through;
//! [`GithubClient`] implements it over the REST API.

pub mod client;

pub use client::GithubClient;

use crate::error::Result;
use crate::models::DateWindow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A commit as returned by the commits listing.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitItem {
    pub sha: String,
}

/// An issue as returned by the issues listing.
///
/// The issues endpoint also returns pull requests; those carry a
/// `pull_request` object.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueItem {
    pub number: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

impl IssueItem {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

/// A pull request as returned by the pulls listing.
#[derive(Debug, Clone, Deserialize)]
pub struct PullItem {
    pub number: u64,
    pub created_at: DateTime<Utc>,
}

/// One week of the code frequency series: `[unix_seconds, additions, deletions]`.
pub type CodeFrequencyWeek = [i64; 3];

/// Code frequency statistics, which GitHub computes lazily.
#[derive(Debug, Clone, PartialEq)]
pub enum CodeFrequency {
    Ready(Vec<CodeFrequencyWeek>),
    /// Statistics are being generated; ask again later.
    Pending,
}

/// Read access to repository activity. List calls return a single page.
#[async_trait]
pub trait RepoStats: Send + Sync {
    /// Page size used by the list calls.
    fn per_page(&self) -> u32;

    async fn list_commits(
        &self,
        owner: &str,
        repo: &str,
        window: &DateWindow,
        page: u32,
    ) -> Result<Vec<CommitItem>>;

    /// Issues updated since `since`, in any state.
    async fn list_issues(
        &self,
        owner: &str,
        repo: &str,
        since: DateTime<Utc>,
        page: u32,
    ) -> Result<Vec<IssueItem>>;

    /// Pull requests in any state.
    async fn list_pulls(&self, owner: &str, repo: &str, page: u32) -> Result<Vec<PullItem>>;

    async fn code_frequency(&self, owner: &str, repo: &str) -> Result<CodeFrequency>;
}
