//! Funding weight computation.
//!
//! Turns the metrics collected for a pool into a merged, rounded list of
//! [`FundingWeight`]s:
//! - [`scoring`] normalizes metrics and applies the weighted formula
//! - [`referral`] routes referral cuts and merges per contributor

pub mod referral;
pub mod scoring;

use crate::error::Result;
use crate::metrics::PoolMetricsCollector;
use crate::models::{DateWindow, FundingWeight, PoolEntry};
use crate::store::RowStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Computed weights keyed by pool id.
pub type PoolWeights = BTreeMap<String, Vec<FundingWeight>>;

pub struct WeightComputer {
    store: Arc<dyn RowStore>,
    collector: PoolMetricsCollector,
}

impl WeightComputer {
    pub fn new(store: Arc<dyn RowStore>, collector: PoolMetricsCollector) -> Self {
        Self { store, collector }
    }

    /// Weights for every pool that is not soft-deleted.
    ///
    /// Pools are processed one at a time; the first failure aborts.
    pub async fn compute_weights(&self, window: &DateWindow) -> Result<PoolWeights> {
        let pools = self.store.list_pools().await?;
        info!("Computing weights for {} pools over {}", pools.len(), window);

        let mut all = PoolWeights::new();
        for pool in pools {
            let weights = self.weights_for_pool(&pool.id, window).await?;
            info!("Pool {} ({}): {} weights", pool.id, pool.name, weights.len());
            all.insert(pool.id, weights);
        }

        Ok(all)
    }

    /// Collect metrics for `pool_id` and turn them into weights.
    pub async fn weights_for_pool(&self, pool_id: &str, window: &DateWindow) -> Result<Vec<FundingWeight>> {
        let entries = self.collector.collect(pool_id, window).await?;
        Ok(self.weights_from_entries(pool_id, &entries).await)
    }

    /// Weights for an already collected pool.
    pub async fn weights_from_entries(&self, pool_id: &str, entries: &[PoolEntry]) -> Vec<FundingWeight> {
        let shares = scoring::contributor_shares(entries);
        let expanded = referral::distribute(self.store.as_ref(), pool_id, entries, &shares).await;
        let weights = referral::finalize(referral::merge(expanded));

        for weight in &weights {
            debug!(
                "{} {} -> {:.4}% ({})",
                pool_id,
                weight.contributor.slug(),
                weight.allocated_funding,
                weight.kind
            );
        }

        weights
    }
}
