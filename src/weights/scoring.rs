//! Normalization and weighted scoring of pool metrics.
//!
//! Every metric is divided by its pool-wide total and the normalized
//! signals are combined with fixed coefficients. A signal whose pool total
//! is zero carries no information; it is left out and the remaining
//! coefficients are rescaled, so shares across a pool always sum to one.

use crate::models::{PoolEntry, ProjectMetrics};

pub const PR_WEIGHT: f64 = 0.4;
pub const ISSUE_WEIGHT: f64 = 0.1;
pub const LINES_WEIGHT: f64 = 0.2;
pub const COMMIT_WEIGHT: f64 = 0.3;

/// Per-contributor ceiling on added and on deleted lines.
pub const LINES_CAP: u64 = 10_000;

/// Pool-wide sums of each metric, lines already capped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolTotals {
    pub prs: u64,
    pub issues: u64,
    pub lines_added: u64,
    pub lines_deleted: u64,
    pub commits: u64,
}

impl PoolTotals {
    pub fn from_metrics<'a>(metrics: impl IntoIterator<Item = &'a ProjectMetrics>) -> Self {
        metrics.into_iter().fold(Self::default(), |totals, m| {
            let (added, deleted) = capped_lines(m);
            Self {
                prs: totals.prs + m.pr_count,
                issues: totals.issues + m.issue_count,
                lines_added: totals.lines_added + added,
                lines_deleted: totals.lines_deleted + deleted,
                commits: totals.commits + m.commit_count,
            }
        })
    }
}

/// Added and deleted lines, each capped at [`LINES_CAP`].
pub fn capped_lines(metrics: &ProjectMetrics) -> (u64, u64) {
    (
        metrics.lines_added.min(LINES_CAP),
        metrics.lines_deleted.min(LINES_CAP),
    )
}

fn ratio(value: u64, total: u64) -> Option<f64> {
    (total > 0).then(|| value as f64 / total as f64)
}

/// Share of one contributor, in `0.0..=1.0`.
///
/// `contributors` is the pool size, used for the equal split when no
/// signal is defined at all.
pub fn share(metrics: &ProjectMetrics, totals: &PoolTotals, contributors: usize) -> f64 {
    let (added, deleted) = capped_lines(metrics);

    let lines = match (ratio(added, totals.lines_added), ratio(deleted, totals.lines_deleted)) {
        (Some(a), Some(d)) => Some((a + d) / 2.0),
        (Some(a), None) => Some(a),
        (None, Some(d)) => Some(d),
        (None, None) => None,
    };

    let signals = [
        (PR_WEIGHT, ratio(metrics.pr_count, totals.prs)),
        (ISSUE_WEIGHT, ratio(metrics.issue_count, totals.issues)),
        (LINES_WEIGHT, lines),
        (COMMIT_WEIGHT, ratio(metrics.commit_count, totals.commits)),
    ];

    let defined_weight: f64 = signals
        .iter()
        .filter_map(|(weight, value)| value.map(|_| *weight))
        .sum();

    if defined_weight == 0.0 {
        return if contributors == 0 {
            0.0
        } else {
            1.0 / contributors as f64
        };
    }

    let score: f64 = signals
        .iter()
        .filter_map(|(weight, value)| value.map(|v| weight * v))
        .sum();

    score / defined_weight
}

/// Shares for every entry of a pool, in entry order.
pub fn contributor_shares(entries: &[PoolEntry]) -> Vec<f64> {
    let totals = PoolTotals::from_metrics(entries.iter().map(|e| &e.metrics));
    entries
        .iter()
        .map(|entry| share(&entry.metrics, &totals, entries.len()))
        .collect()
}
