//! Data models for funding pools and their weights.
//!
//! This module contains the row-store records (pools and registrations),
//! the per-project activity metrics and the computed funding weights.

use chrono::{DateTime, Duration, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A funding pool as stored in the `funding_pools` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingPool {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Identifier of the split target payouts are routed through.
    #[serde(default)]
    pub split_address: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Soft-delete marker.
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl FundingPool {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A project enrolled in a pool (`pool_registrations` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub pool_id: String,
    pub user_id: String,
    pub artifact_namespace: String,
    pub artifact_name: String,
    #[serde(default = "default_artifact_source")]
    pub artifact_source: String,
    pub wallet_address: String,
    /// Either a contributor id or a query string carrying `referrer=<id>`.
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_artifact_source() -> String {
    "GITHUB".to_string()
}

impl Registration {
    /// `namespace/name` of the registered repository.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.artifact_namespace, self.artifact_name)
    }

    pub fn has_valid_wallet(&self) -> bool {
        is_valid_address(&self.wallet_address)
    }

    /// The id of whoever referred this project, if any.
    ///
    /// A referrer stored as a link or query string (`?ref=x&referrer=<id>`)
    /// resolves to the inner `referrer` parameter. Percent-encoded values,
    /// including a wholly encoded query string, are decoded.
    pub fn referrer_id(&self) -> Option<String> {
        let raw = self.referrer.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }

        if let Some(id) = referrer_param(raw) {
            return Some(id);
        }
        let decoded = percent_decode(raw);
        referrer_param(&decoded).or(Some(decoded))
    }
}

/// The decoded `referrer` parameter of the query part of `text`, if set.
fn referrer_param(text: &str) -> Option<String> {
    let query = text.split_once('?').map(|(_, q)| q).unwrap_or(text);
    query_value(query, "referrer")
}

fn query_value(query: &str, key: &str) -> Option<String> {
    let mut url = Url::parse("http://referrer.invalid/").ok()?;
    url.set_query(Some(query));
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn percent_decode(text: &str) -> String {
    query_value(&format!("v={}", text.replace('&', "%26")), "v").unwrap_or_else(|| text.to_string())
}

/// Whether `address` is a syntactically valid EVM address (`0x` + 40 hex digits).
pub fn is_valid_address(address: &str) -> bool {
    match address.strip_prefix("0x") {
        Some(hex) => hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// Activity counts for one project over one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetrics {
    pub commit_count: u64,
    pub issue_count: u64,
    pub pr_count: u64,
    pub lines_added: u64,
    /// Magnitude of deleted lines.
    pub lines_deleted: u64,
}

impl ProjectMetrics {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// A registration paired with the metrics collected for it.
#[derive(Debug, Clone)]
pub struct PoolEntry {
    pub registration: Registration,
    pub metrics: ProjectMetrics,
}

/// Identity a weight is paid out to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Contributor {
    pub id: String,
    pub wallet: String,
    pub artifact_namespace: String,
    pub artifact_name: String,
}

impl Contributor {
    pub fn slug(&self) -> String {
        format!("{}/{}", self.artifact_namespace, self.artifact_name)
    }
}

impl From<&Registration> for Contributor {
    fn from(registration: &Registration) -> Self {
        Self {
            id: registration.user_id.clone(),
            wallet: registration.wallet_address.clone(),
            artifact_namespace: registration.artifact_namespace.clone(),
            artifact_name: registration.artifact_name.clone(),
        }
    }
}

/// How a weight entry came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightKind {
    /// Contributor's own, unreferred share.
    Base,
    /// Entry produced by referral redistribution.
    Referrer,
}

impl fmt::Display for WeightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightKind::Base => write!(f, "base"),
            WeightKind::Referrer => write!(f, "referrer"),
        }
    }
}

/// A contributor's percentage of a pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingWeight {
    pub contributor: Contributor,
    pub kind: WeightKind,
    #[serde(rename = "allocatedFunding")]
    pub allocated_funding: f64,
}

/// Closed time window `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateWindow {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// The `days` days leading up to `now`.
    pub fn last_days(days: i64, now: DateTime<Utc>) -> Self {
        Self {
            from: now - Duration::days(days),
            to: now,
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from <= instant && instant <= self.to
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} .. {}",
            self.from.format("%Y-%m-%d %H:%M:%S"),
            self.to.format("%Y-%m-%d %H:%M:%S")
        )
    }
}
