//! Recovery files.
//!
//! A recovery file holds one pool's final weights as plain text, one
//! `namespace/name: percentage%` line per contributor. It is written after
//! computation and can be fed back to skip the GitHub aggregation when a
//! later step failed.

use crate::error::{Error, Result};
use crate::models::{Contributor, FundingWeight, WeightKind};
use crate::store::RowStore;
use crate::weights::referral::round4;
use crate::weights::PoolWeights;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Drift from 100 accepted in a file, covering per-line rounding.
pub const TOTAL_TOLERANCE: f64 = 0.01;

/// One parsed recovery line.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryLine {
    /// 1-based line number in the file.
    pub line: usize,
    pub namespace: String,
    pub name: String,
    pub percentage: f64,
}

/// Parse recovery file content. Blank lines are skipped.
pub fn parse(content: &str) -> Result<Vec<RecoveryLine>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(index, text)| parse_line(index + 1, text))
        .collect()
}

fn parse_line(line: usize, text: &str) -> Result<RecoveryLine> {
    let malformed = |reason: &str| Error::Recovery {
        line,
        reason: reason.to_string(),
    };

    let (project, percentage) = text
        .rsplit_once(':')
        .ok_or_else(|| malformed("expected `namespace/name: percentage%`"))?;

    let (namespace, name) = project
        .trim()
        .split_once('/')
        .ok_or_else(|| malformed("project must be `namespace/name`"))?;
    if namespace.is_empty() || name.is_empty() || name.contains('/') {
        return Err(malformed("project must be `namespace/name`"));
    }

    let percentage = percentage.trim();
    let number = percentage.strip_suffix('%').unwrap_or(percentage).trim();
    let value: f64 = number
        .parse()
        .map_err(|_| malformed(&format!("invalid percentage {:?}", percentage)))?;
    if !value.is_finite() || value < 0.0 {
        return Err(malformed(&format!("invalid percentage {:?}", percentage)));
    }

    Ok(RecoveryLine {
        line,
        namespace: namespace.to_string(),
        name: name.to_string(),
        percentage: round4(value),
    })
}

/// The percentages of a file must add up to 100 within [`TOTAL_TOLERANCE`].
pub fn check_total(lines: &[RecoveryLine]) -> Result<()> {
    let total: f64 = lines.iter().map(|l| l.percentage).sum();
    if lines.is_empty() || (total - 100.0).abs() > TOTAL_TOLERANCE {
        return Err(Error::Validation(format!(
            "Recovery file percentages sum to {:.4}, expected 100",
            total
        )));
    }
    Ok(())
}

/// Render weights in recovery file format.
pub fn render(weights: &[FundingWeight]) -> String {
    weights
        .iter()
        .map(|w| format!("{}: {:.4}%\n", w.contributor.slug(), w.allocated_funding))
        .collect()
}

/// Rebuild `pool_id`'s weights from recovery file content.
///
/// Each line is matched to its registration in the pool; lines without one
/// are skipped with a warning. Store failures are fatal.
pub async fn load_weights(store: &dyn RowStore, pool_id: &str, content: &str) -> Result<PoolWeights> {
    let lines = parse(content)?;
    check_total(&lines)?;
    let mut weights = Vec::with_capacity(lines.len());

    for entry in lines {
        let registration = store
            .find_registration_by_artifact(pool_id, &entry.namespace, &entry.name)
            .await?;

        match registration {
            Some(registration) => weights.push(FundingWeight {
                contributor: Contributor::from(&registration),
                kind: WeightKind::Referrer,
                allocated_funding: entry.percentage,
            }),
            None => warn!(
                "Line {}: no registration for {}/{} in pool {}; skipping",
                entry.line, entry.namespace, entry.name, pool_id
            ),
        }
    }

    weights.sort_by(|a, b| {
        b.allocated_funding
            .partial_cmp(&a.allocated_funding)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    info!("Loaded {} weights for pool {} from recovery file", weights.len(), pool_id);

    let mut all = PoolWeights::new();
    all.insert(pool_id.to_string(), weights);
    Ok(all)
}

/// Read a recovery file from disk and rebuild its weights.
pub async fn load_file(store: &dyn RowStore, pool_id: &str, path: &Path) -> Result<PoolWeights> {
    let content = fs::read_to_string(path)?;
    load_weights(store, pool_id, &content).await
}

/// Write one `<pool_id>.txt` recovery file per pool into `dir`.
pub fn write_dump(dir: &Path, pool_weights: &PoolWeights) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(pool_weights.len());
    for (pool_id, weights) in pool_weights {
        let path = dir.join(format!("{}.txt", pool_id));
        fs::write(&path, render(weights))?;
        info!("Wrote {} weights to {}", weights.len(), path.display());
        written.push(path);
    }

    Ok(written)
}
