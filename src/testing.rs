//! In-memory collaborators for unit tests.

use crate::error::{Error, Result};
use crate::github::{CodeFrequency, CodeFrequencyWeek, CommitItem, IssueItem, PullItem, RepoStats};
use crate::models::{DateWindow, FundingPool, ProjectMetrics, Registration};
use crate::splits::{CreateSplitConfig, CreatedSplit, SplitsClient, UpdateSplitConfig};
use crate::store::{NewPool, RowStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

pub const WALLET_A: &str = "0x1111111111111111111111111111111111111111";
pub const WALLET_B: &str = "0x2222222222222222222222222222222222222222";
pub const WALLET_C: &str = "0x3333333333333333333333333333333333333333";

pub fn registration(pool_id: &str, user_id: &str, slug: &str, wallet: &str) -> Registration {
    let (namespace, name) = slug.split_once('/').unwrap_or((slug, slug));
    Registration {
        pool_id: pool_id.to_string(),
        user_id: user_id.to_string(),
        artifact_namespace: namespace.to_string(),
        artifact_name: name.to_string(),
        artifact_source: "GITHUB".to_string(),
        wallet_address: wallet.to_string(),
        referrer: None,
        created_at: None,
    }
}

pub fn pool(id: &str, split_address: Option<&str>) -> FundingPool {
    FundingPool {
        id: id.to_string(),
        name: format!("Pool {}", id),
        description: None,
        split_address: split_address.map(String::from),
        user_id: None,
        created_at: None,
        updated_at: None,
        deleted_at: None,
    }
}

pub fn metrics(pr: u64, issue: u64, added: u64, deleted: u64, commit: u64) -> ProjectMetrics {
    ProjectMetrics {
        commit_count: commit,
        issue_count: issue,
        pr_count: pr,
        lines_added: added,
        lines_deleted: deleted,
    }
}

/// Activity served for one repository.
#[derive(Debug, Clone, Default)]
pub struct RepoActivity {
    pub commits: Vec<CommitItem>,
    pub issues: Vec<IssueItem>,
    pub pulls: Vec<PullItem>,
    pub code_frequency: Vec<CodeFrequencyWeek>,
}

/// Scriptable GitHub stand-in.
pub struct FakeStats {
    per_page: u32,
    repos: HashMap<String, RepoActivity>,
    failures_left: Mutex<u32>,
    pending_left: Mutex<u32>,
    commit_calls: Mutex<u32>,
    pull_calls: Mutex<u32>,
}

impl FakeStats {
    pub fn new(per_page: u32) -> Self {
        Self {
            per_page,
            repos: HashMap::new(),
            failures_left: Mutex::new(0),
            pending_left: Mutex::new(0),
            commit_calls: Mutex::new(0),
            pull_calls: Mutex::new(0),
        }
    }

    pub fn with_repo(mut self, slug: &str, activity: RepoActivity) -> Self {
        self.repos.insert(slug.to_string(), activity);
        self
    }

    /// The next `n` fetch attempts fail on their first request.
    pub fn failing(self, n: u32) -> Self {
        *self.failures_left.lock().unwrap() = n;
        self
    }

    /// The next `n` code frequency requests report "still computing".
    pub fn pending(self, n: u32) -> Self {
        *self.pending_left.lock().unwrap() = n;
        self
    }

    /// Requests made for the first commits page, i.e. fetch attempts.
    pub fn attempts(&self) -> u32 {
        *self.commit_calls.lock().unwrap()
    }

    /// Pull request pages requested so far.
    pub fn pull_pages(&self) -> u32 {
        *self.pull_calls.lock().unwrap()
    }

    fn repo(&self, owner: &str, repo: &str) -> Result<&RepoActivity> {
        self.repos
            .get(&format!("{}/{}", owner, repo))
            .ok_or_else(|| Error::Github(format!("404 Not Found for {}/{}", owner, repo)))
    }

    fn page<T: Clone>(&self, items: &[T], page: u32) -> Vec<T> {
        let size = self.per_page as usize;
        items
            .iter()
            .skip((page as usize - 1) * size)
            .take(size)
            .cloned()
            .collect()
    }
}

pub fn commit(sha: &str) -> CommitItem {
    CommitItem { sha: sha.to_string() }
}

pub fn issue(number: u64, created_at: DateTime<Utc>, is_pull: bool) -> IssueItem {
    IssueItem {
        number,
        created_at,
        pull_request: is_pull.then(|| serde_json::json!({})),
    }
}

pub fn pull(number: u64, created_at: DateTime<Utc>) -> PullItem {
    PullItem { number, created_at }
}

#[async_trait]
impl RepoStats for FakeStats {
    fn per_page(&self) -> u32 {
        self.per_page
    }

    async fn list_commits(
        &self,
        owner: &str,
        repo: &str,
        _window: &DateWindow,
        page: u32,
    ) -> Result<Vec<CommitItem>> {
        if page == 1 {
            *self.commit_calls.lock().unwrap() += 1;
            let mut failures = self.failures_left.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(Error::Github("502 Bad Gateway".to_string()));
            }
        }
        Ok(self.page(&self.repo(owner, repo)?.commits, page))
    }

    async fn list_issues(
        &self,
        owner: &str,
        repo: &str,
        _since: DateTime<Utc>,
        page: u32,
    ) -> Result<Vec<IssueItem>> {
        Ok(self.page(&self.repo(owner, repo)?.issues, page))
    }

    async fn list_pulls(&self, owner: &str, repo: &str, page: u32) -> Result<Vec<PullItem>> {
        *self.pull_calls.lock().unwrap() += 1;
        Ok(self.page(&self.repo(owner, repo)?.pulls, page))
    }

    async fn code_frequency(&self, owner: &str, repo: &str) -> Result<CodeFrequency> {
        let mut pending = self.pending_left.lock().unwrap();
        if *pending > 0 {
            *pending -= 1;
            return Ok(CodeFrequency::Pending);
        }
        Ok(CodeFrequency::Ready(self.repo(owner, repo)?.code_frequency.clone()))
    }
}

/// Row store backed by vectors.
#[derive(Default)]
pub struct MemoryStore {
    pub pools: Mutex<Vec<FundingPool>>,
    pub registrations: Mutex<Vec<Registration>>,
    pub fail_listing: bool,
    pub fail_updates: bool,
}

impl MemoryStore {
    pub fn new(pools: Vec<FundingPool>, registrations: Vec<Registration>) -> Self {
        Self {
            pools: Mutex::new(pools),
            registrations: Mutex::new(registrations),
            ..Self::default()
        }
    }

    pub fn split_address(&self, pool_id: &str) -> Option<String> {
        self.pools
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == pool_id)
            .and_then(|p| p.split_address.clone())
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn list_pools(&self) -> Result<Vec<FundingPool>> {
        if self.fail_listing {
            return Err(Error::Store("connection refused".to_string()));
        }
        Ok(self
            .pools
            .lock()
            .unwrap()
            .iter()
            .filter(|p| !p.is_deleted())
            .cloned()
            .collect())
    }

    async fn get_pool(&self, pool_id: &str) -> Result<FundingPool> {
        self.pools
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == pool_id)
            .cloned()
            .ok_or_else(|| Error::Store(format!("Pool {} not found", pool_id)))
    }

    async fn registrations_for_pool(&self, pool_id: &str) -> Result<Vec<Registration>> {
        if self.fail_listing {
            return Err(Error::Store("connection refused".to_string()));
        }
        Ok(self
            .registrations
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.pool_id == pool_id)
            .cloned()
            .collect())
    }

    async fn find_registration(&self, pool_id: &str, user_id: &str) -> Result<Option<Registration>> {
        Ok(self
            .registrations
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.pool_id == pool_id && r.user_id == user_id)
            .cloned())
    }

    async fn find_registration_by_artifact(
        &self,
        pool_id: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Registration>> {
        Ok(self
            .registrations
            .lock()
            .unwrap()
            .iter()
            .find(|r| {
                r.pool_id == pool_id && r.artifact_namespace == namespace && r.artifact_name == name
            })
            .cloned())
    }

    async fn set_split_address(&self, pool_id: &str, split_address: &str) -> Result<()> {
        if self.fail_updates {
            return Err(Error::Store("permission denied".to_string()));
        }
        let mut pools = self.pools.lock().unwrap();
        let pool = pools
            .iter_mut()
            .find(|p| p.id == pool_id)
            .ok_or_else(|| Error::Store(format!("Pool {} not found", pool_id)))?;
        pool.split_address = Some(split_address.to_string());
        Ok(())
    }

    async fn insert_pool(&self, new_pool: &NewPool) -> Result<FundingPool> {
        let mut pools = self.pools.lock().unwrap();
        let mut inserted = pool(&format!("pool-{}", pools.len() + 1), None);
        inserted.name = new_pool.name.clone();
        inserted.description = new_pool.description.clone();
        inserted.user_id = new_pool.user_id.clone();
        pools.push(inserted.clone());
        Ok(inserted)
    }

    async fn insert_registration(&self, registration: &Registration) -> Result<()> {
        self.registrations.lock().unwrap().push(registration.clone());
        Ok(())
    }
}

/// Split client that records every call.
#[derive(Default)]
pub struct RecordingSplits {
    pub created: Mutex<Vec<CreateSplitConfig>>,
    pub updated: Mutex<Vec<UpdateSplitConfig>>,
    pub fail: bool,
}

#[async_trait]
impl SplitsClient for RecordingSplits {
    async fn create_split(&self, config: &CreateSplitConfig) -> Result<CreatedSplit> {
        if self.fail {
            return Err(Error::Splits("execution reverted".to_string()));
        }
        let mut created = self.created.lock().unwrap();
        created.push(config.clone());
        Ok(CreatedSplit {
            split_address: format!("0xsplit{}", created.len()),
            event: "SplitCreated".to_string(),
        })
    }

    async fn update_split(&self, config: &UpdateSplitConfig) -> Result<String> {
        if self.fail {
            return Err(Error::Splits("execution reverted".to_string()));
        }
        self.updated.lock().unwrap().push(config.clone());
        Ok("SplitUpdated".to_string())
    }
}
