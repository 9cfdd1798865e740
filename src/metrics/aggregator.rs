//! Per-project activity aggregation.
//!
//! Counts commits, issues, pull requests and changed lines for one
//! repository over a [`DateWindow`]. GitHub computes code frequency
//! statistics lazily and is rate limited, so every fetch runs under a
//! bounded retry budget and degrades to zero metrics once it is spent.

use crate::config::GithubConfig;
use crate::error::{Error, Result};
use crate::github::{CodeFrequency, CodeFrequencyWeek, PullItem, RepoStats};
use crate::models::{DateWindow, ProjectMetrics};
use chrono::{TimeZone, Utc};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry budget and fixed delay for one project fetch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 5,
            delay: Duration::from_secs(10),
        }
    }
}

impl From<&GithubConfig> for RetryPolicy {
    fn from(config: &GithubConfig) -> Self {
        Self {
            retries: config.retries,
            delay: config.retry_delay(),
        }
    }
}

pub struct MetricsAggregator {
    stats: Arc<dyn RepoStats>,
    policy: RetryPolicy,
}

impl MetricsAggregator {
    pub fn new(stats: Arc<dyn RepoStats>, policy: RetryPolicy) -> Self {
        Self { stats, policy }
    }

    /// Metrics for `owner/repo` over `window`.
    ///
    /// Never fails: once the retry budget is exhausted the project is
    /// reported with all-zero metrics.
    pub async fn metrics_for_project(
        &self,
        owner: &str,
        repo: &str,
        window: &DateWindow,
    ) -> ProjectMetrics {
        let mut retries_left = self.policy.retries;

        loop {
            let err = match self.fetch_once(owner, repo, window).await {
                Ok(metrics) => return metrics,
                Err(err) => err,
            };

            if retries_left == 0 {
                warn!(
                    "Giving up on {}/{} after {} retries ({}); using zero metrics",
                    owner, repo, self.policy.retries, err
                );
                return ProjectMetrics::default();
            }
            retries_left -= 1;

            if err.is_pending() {
                warn!(
                    "Code frequency not available for {}/{}, retrying in {}s ({} retries left)",
                    owner,
                    repo,
                    self.policy.delay.as_secs(),
                    retries_left
                );
            } else {
                warn!(
                    "Fetching metrics for {}/{} failed: {} ({} retries left)",
                    owner, repo, err, retries_left
                );
            }
            tokio::time::sleep(self.policy.delay).await;
        }
    }

    /// One full fetch of every statistic.
    async fn fetch_once(&self, owner: &str, repo: &str, window: &DateWindow) -> Result<ProjectMetrics> {
        let per_page = self.stats.per_page();

        // Pages can shift while they are read, so items are counted once by identity.
        let commits = fetch_all(per_page, |page| {
            self.stats.list_commits(owner, repo, window, page)
        })
        .await?;
        let commit_count = commits
            .iter()
            .map(|commit| commit.sha.as_str())
            .collect::<HashSet<_>>()
            .len();

        let issues = fetch_all(per_page, |page| {
            self.stats.list_issues(owner, repo, window.from, page)
        })
        .await?;
        let issue_count = issues
            .iter()
            .filter(|issue| !issue.is_pull_request() && window.contains(issue.created_at))
            .map(|issue| issue.number)
            .collect::<HashSet<_>>()
            .len();

        // Pulls come newest first; a page reaching back before the window is the last one needed.
        let pulls = fetch_until(
            per_page,
            |page| self.stats.list_pulls(owner, repo, page),
            |batch: &[PullItem]| batch.iter().any(|pull| pull.created_at < window.from),
        )
        .await?;
        let pr_count = pulls
            .iter()
            .filter(|pull| window.contains(pull.created_at))
            .map(|pull| pull.number)
            .collect::<HashSet<_>>()
            .len();

        let weeks = match self.stats.code_frequency(owner, repo).await? {
            CodeFrequency::Ready(weeks) => weeks,
            CodeFrequency::Pending => return Err(Error::StatsPending(format!("{}/{}", owner, repo))),
        };
        let (lines_added, lines_deleted) = sum_code_frequency(&weeks, window);

        let metrics = ProjectMetrics {
            commit_count: commit_count as u64,
            issue_count: issue_count as u64,
            pr_count: pr_count as u64,
            lines_added,
            lines_deleted,
        };
        debug!("Metrics for {}/{}: {:?}", owner, repo, metrics);

        Ok(metrics)
    }
}

/// Read pages starting at 1 until a short page comes back.
async fn fetch_all<T, F, Fut>(per_page: u32, fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    fetch_until(per_page, fetch_page, |_: &[T]| false).await
}

/// Like [`fetch_all`], but also stops after a page for which `is_last` holds.
async fn fetch_until<T, F, Fut, S>(per_page: u32, mut fetch_page: F, is_last: S) -> Result<Vec<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
    S: Fn(&[T]) -> bool,
{
    let mut items = Vec::new();
    let mut page = 1;

    loop {
        let batch = fetch_page(page).await?;
        let more = batch.len() >= per_page as usize && !batch.is_empty() && !is_last(&batch);
        items.extend(batch);
        if !more {
            return Ok(items);
        }
        page += 1;
    }
}

/// Added and deleted line magnitudes of the weeks starting inside `window`.
pub fn sum_code_frequency(weeks: &[CodeFrequencyWeek], window: &DateWindow) -> (u64, u64) {
    weeks
        .iter()
        .filter(|[timestamp, _, _]| {
            Utc.timestamp_opt(*timestamp, 0)
                .single()
                .map(|instant| window.contains(instant))
                .unwrap_or(false)
        })
        .fold((0, 0), |(added, deleted), [_, additions, deletions]| {
            (
                added + additions.unsigned_abs(),
                deleted + deletions.unsigned_abs(),
            )
        })
}
