//! Run reports.
//!
//! Summarizes one `update-weights` run: the window, every pool's split
//! outcome and the weights that were distributed.

mod generator;

pub use generator::write_report;

use crate::models::DateWindow;
use crate::reconcile::{PoolOutcome, SplitAction};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where the weights of a run came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum WeightSource {
    /// Aggregated from GitHub over the window.
    Github,
    /// Read back from a recovery file.
    RecoveryFile(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub window: Option<DateWindow>,
    pub source: WeightSource,
    pub dry_run: bool,
    pub duration_seconds: f64,
    pub pools: Vec<PoolOutcome>,
}

impl RunReport {
    /// Number of pools that ended with `action`.
    pub fn count(&self, action: SplitAction) -> usize {
        self.pools.iter().filter(|p| p.action == action).count()
    }
}
