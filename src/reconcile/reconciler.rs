//! Create-or-update state machine for pool split targets.
//!
//! A pool without a persisted split address gets a new split whose address
//! is written back to the pool; a pool with one gets its recipients
//! replaced. The first failing pool aborts the run.

use crate::error::{Error, Result};
use crate::models::FundingWeight;
use crate::splits::{
    CreateSplitConfig, Recipient, SplitType, SplitsClient, UpdateSplitConfig, DISTRIBUTOR_FEE_PERCENT,
};
use crate::store::RowStore;
use crate::weights::PoolWeights;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// 1e-4 percent units in a whole pool.
const TOTAL_UNITS: i64 = 1_000_000;
const UNITS_PER_PERCENT: f64 = 10_000.0;

/// What happened to a pool's split target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitAction {
    Created,
    Updated,
    /// No weights; nothing submitted.
    Skipped,
    /// Computed only; nothing submitted or persisted.
    DryRun,
}

impl fmt::Display for SplitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitAction::Created => write!(f, "created"),
            SplitAction::Updated => write!(f, "updated"),
            SplitAction::Skipped => write!(f, "skipped"),
            SplitAction::DryRun => write!(f, "dry-run"),
        }
    }
}

/// Result of reconciling one pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolOutcome {
    pub pool_id: String,
    pub action: SplitAction,
    pub split_address: Option<String>,
    pub event: Option<String>,
    pub weights: Vec<FundingWeight>,
}

/// Force the allocations to sum to exactly 100.
///
/// Values are moved to 1e-4 units, the shortfall or excess is added to the
/// first entry, and the units are converted back. Fails if any allocation
/// is negative or would become negative.
pub fn rebalance(mut weights: Vec<FundingWeight>) -> Result<Vec<FundingWeight>> {
    if weights.is_empty() {
        return Ok(weights);
    }

    let mut units: Vec<i64> = weights
        .iter()
        .map(|w| (w.allocated_funding * UNITS_PER_PERCENT).round() as i64)
        .collect();
    if let Some(i) = units.iter().position(|&u| u < 0) {
        return Err(Error::Validation(format!(
            "{} has a negative allocation ({})",
            weights[i].contributor.slug(),
            weights[i].allocated_funding
        )));
    }

    let diff = TOTAL_UNITS - units.iter().sum::<i64>();
    if units[0] + diff < 0 {
        return Err(Error::Validation(format!(
            "Allocations sum to {:.4}; cannot rebalance to 100 without a negative share for {}",
            units.iter().sum::<i64>() as f64 / UNITS_PER_PERCENT,
            weights[0].contributor.slug()
        )));
    }
    units[0] += diff;

    for (weight, unit) in weights.iter_mut().zip(units) {
        weight.allocated_funding = unit as f64 / UNITS_PER_PERCENT;
    }
    Ok(weights)
}

/// Drives split creation and updates for computed weights.
pub struct Reconciler {
    store: Arc<dyn RowStore>,
    splits: Option<Arc<dyn SplitsClient>>,
    owner_address: String,
    chain_id: u64,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn RowStore>,
        splits: Arc<dyn SplitsClient>,
        owner_address: impl Into<String>,
        chain_id: u64,
    ) -> Self {
        Self {
            store,
            splits: Some(splits),
            owner_address: owner_address.into(),
            chain_id,
        }
    }

    /// A reconciler that reports what it would do without side effects.
    pub fn dry_run(store: Arc<dyn RowStore>) -> Self {
        Self {
            store,
            splits: None,
            owner_address: String::new(),
            chain_id: 0,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.splits.is_none()
    }

    /// Reconcile every pool in key order; stops at the first error.
    pub async fn reconcile(&self, pool_weights: &PoolWeights) -> Result<Vec<PoolOutcome>> {
        let mut outcomes = Vec::with_capacity(pool_weights.len());
        for (pool_id, weights) in pool_weights {
            outcomes.push(self.reconcile_pool(pool_id, weights.clone()).await?);
        }
        Ok(outcomes)
    }

    pub async fn reconcile_pool(&self, pool_id: &str, weights: Vec<FundingWeight>) -> Result<PoolOutcome> {
        if weights.is_empty() {
            warn!("Pool {} has no weights; skipping", pool_id);
            return Ok(PoolOutcome {
                pool_id: pool_id.to_string(),
                action: SplitAction::Skipped,
                split_address: None,
                event: None,
                weights,
            });
        }

        let weights = rebalance(weights)?;
        let pool = self.store.get_pool(pool_id).await?;
        let recipients = Recipient::from_weights(&weights);

        let splits = match self.splits {
            Some(ref splits) => splits,
            None => {
                info!(
                    "[dry run] Pool {} would {} split with {} recipients",
                    pool_id,
                    if pool.split_address.is_some() { "update its" } else { "create a" },
                    recipients.len()
                );
                return Ok(PoolOutcome {
                    pool_id: pool_id.to_string(),
                    action: SplitAction::DryRun,
                    split_address: pool.split_address,
                    event: None,
                    weights,
                });
            }
        };

        match pool.split_address {
            None => {
                info!("Creating split for pool {} ({} recipients)", pool_id, recipients.len());
                let created = splits
                    .create_split(&CreateSplitConfig {
                        recipients,
                        distributor_fee_percent: DISTRIBUTOR_FEE_PERCENT,
                        split_type: SplitType::Push,
                        owner_address: self.owner_address.clone(),
                        creator_address: self.owner_address.clone(),
                        chain_id: self.chain_id,
                    })
                    .await?;

                self.store
                    .set_split_address(pool_id, &created.split_address)
                    .await?;
                info!(
                    "Created split {} for pool {}: {}",
                    created.split_address, pool_id, created.event
                );

                Ok(PoolOutcome {
                    pool_id: pool_id.to_string(),
                    action: SplitAction::Created,
                    split_address: Some(created.split_address),
                    event: Some(created.event),
                    weights,
                })
            }
            Some(split_address) => {
                info!("Updating split {} for pool {}", split_address, pool_id);
                let event = splits
                    .update_split(&UpdateSplitConfig {
                        split_address: split_address.clone(),
                        recipients,
                        distributor_fee_percent: DISTRIBUTOR_FEE_PERCENT,
                    })
                    .await?;
                info!("Updated split {} for pool {}: {}", split_address, pool_id, event);

                Ok(PoolOutcome {
                    pool_id: pool_id.to_string(),
                    action: SplitAction::Updated,
                    split_address: Some(split_address),
                    event: Some(event),
                    weights,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Contributor, WeightKind};
    use crate::testing::{pool, registration, MemoryStore, RecordingSplits, WALLET_A, WALLET_B, WALLET_C};

    const OPERATOR: &str = "0x9999999999999999999999999999999999999999";

    fn weight(wallet: &str, slug: &str, amount: f64) -> FundingWeight {
        FundingWeight {
            contributor: Contributor::from(&registration("p1", slug, slug, wallet)),
            kind: WeightKind::Base,
            allocated_funding: amount,
        }
    }

    fn units(weights: &[FundingWeight]) -> i64 {
        weights
            .iter()
            .map(|w| (w.allocated_funding * UNITS_PER_PERCENT).round() as i64)
            .sum()
    }

    fn reconciler(store: Arc<MemoryStore>, splits: Arc<RecordingSplits>) -> Reconciler {
        Reconciler::new(store, splits, OPERATOR, 11_155_111)
    }

    #[test]
    fn test_rebalance_fixes_rounding_drift() {
        let third = 33.3333;
        let weights = rebalance(vec![
            weight(WALLET_A, "a/a", third),
            weight(WALLET_B, "b/b", third),
            weight(WALLET_C, "c/c", third),
        ])
        .unwrap();

        assert_eq!(units(&weights), TOTAL_UNITS);
        assert_eq!(weights[0].allocated_funding, 33.3334);
        assert_eq!(weights[1].allocated_funding, 33.3333);
    }

    #[test]
    fn test_rebalance_removes_excess() {
        let weights =
            rebalance(vec![weight(WALLET_A, "a/a", 50.5001), weight(WALLET_B, "b/b", 49.5)]).unwrap();
        assert_eq!(units(&weights), TOTAL_UNITS);
        assert_eq!(weights[0].allocated_funding, 50.5);
    }

    #[test]
    fn test_rebalance_leaves_exact_lists_alone() {
        let weights =
            rebalance(vec![weight(WALLET_A, "a/a", 75.0), weight(WALLET_B, "b/b", 25.0)]).unwrap();
        assert_eq!(weights[0].allocated_funding, 75.0);
        assert_eq!(weights[1].allocated_funding, 25.0);
        assert!(rebalance(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_rebalance_refuses_negative_first_entry() {
        let result = rebalance(vec![
            weight(WALLET_A, "a/a", 10.0),
            weight(WALLET_B, "b/b", 80.0),
            weight(WALLET_C, "c/c", 60.0),
        ]);
        assert!(matches!(result, Err(Error::Validation(_))));

        let result = rebalance(vec![weight(WALLET_A, "a/a", 110.0), weight(WALLET_B, "b/b", -10.0)]);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_overfull_pool_is_never_submitted() {
        let store = Arc::new(MemoryStore::new(vec![pool("p1", None)], vec![]));
        let splits = Arc::new(RecordingSplits::default());

        let mut all = PoolWeights::new();
        all.insert(
            "p1".to_string(),
            vec![
                weight(WALLET_A, "a/a", 10.0),
                weight(WALLET_B, "b/b", 80.0),
                weight(WALLET_C, "c/c", 60.0),
            ],
        );

        assert!(reconciler(store.clone(), splits.clone()).reconcile(&all).await.is_err());
        assert!(splits.created.lock().unwrap().is_empty());
        assert_eq!(store.split_address("p1"), None);
    }

    #[tokio::test]
    async fn test_missing_split_is_created_and_persisted() {
        let store = Arc::new(MemoryStore::new(vec![pool("p1", None)], vec![]));
        let splits = Arc::new(RecordingSplits::default());

        let mut all = PoolWeights::new();
        all.insert("p1".to_string(), vec![weight(WALLET_A, "a/a", 60.0), weight(WALLET_B, "b/b", 40.0)]);

        let outcomes = reconciler(store.clone(), splits.clone()).reconcile(&all).await.unwrap();

        assert_eq!(outcomes[0].action, SplitAction::Created);
        assert_eq!(outcomes[0].split_address.as_deref(), Some("0xsplit1"));
        assert_eq!(store.split_address("p1").as_deref(), Some("0xsplit1"));

        let created = splits.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].distributor_fee_percent, 0.0);
        assert_eq!(created[0].owner_address, OPERATOR);
        assert_eq!(created[0].creator_address, OPERATOR);
        assert_eq!(created[0].chain_id, 11_155_111);
        assert_eq!(created[0].recipients[0].address, WALLET_A);
        assert_eq!(created[0].recipients[0].percent_allocation, 60.0);
        assert!(splits.updated.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_existing_split_is_updated_in_place() {
        let store = Arc::new(MemoryStore::new(vec![pool("p1", Some("0xabc"))], vec![]));
        let splits = Arc::new(RecordingSplits::default());

        let mut all = PoolWeights::new();
        all.insert("p1".to_string(), vec![weight(WALLET_A, "a/a", 100.0)]);

        let outcomes = reconciler(store.clone(), splits.clone()).reconcile(&all).await.unwrap();

        assert_eq!(outcomes[0].action, SplitAction::Updated);
        assert_eq!(outcomes[0].event.as_deref(), Some("SplitUpdated"));
        let updated = splits.updated.lock().unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].split_address, "0xabc");
        assert_eq!(store.split_address("p1").as_deref(), Some("0xabc"));
        assert!(splits.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_pool_is_skipped() {
        let store = Arc::new(MemoryStore::new(vec![pool("p1", None)], vec![]));
        let splits = Arc::new(RecordingSplits::default());

        let mut all = PoolWeights::new();
        all.insert("p1".to_string(), Vec::new());

        let outcomes = reconciler(store, splits.clone()).reconcile(&all).await.unwrap();
        assert_eq!(outcomes[0].action, SplitAction::Skipped);
        assert!(splits.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_pools() {
        let store = Arc::new(MemoryStore::new(vec![pool("p1", None), pool("p2", None)], vec![]));
        let splits = Arc::new(RecordingSplits {
            fail: true,
            ..RecordingSplits::default()
        });

        let mut all = PoolWeights::new();
        all.insert("p1".to_string(), vec![weight(WALLET_A, "a/a", 100.0)]);
        all.insert("p2".to_string(), vec![weight(WALLET_B, "b/b", 100.0)]);

        assert!(reconciler(store.clone(), splits).reconcile(&all).await.is_err());
        assert_eq!(store.split_address("p1"), None);
        assert_eq!(store.split_address("p2"), None);
    }

    #[tokio::test]
    async fn test_persist_failure_is_fatal() {
        let store = Arc::new(MemoryStore {
            fail_updates: true,
            ..MemoryStore::new(vec![pool("p1", None)], vec![])
        });
        let splits = Arc::new(RecordingSplits::default());

        let mut all = PoolWeights::new();
        all.insert("p1".to_string(), vec![weight(WALLET_A, "a/a", 100.0)]);

        assert!(reconciler(store, splits).reconcile(&all).await.is_err());
    }

    #[tokio::test]
    async fn test_dry_run_submits_nothing() {
        let store = Arc::new(MemoryStore::new(vec![pool("p1", None)], vec![]));
        let reconciler = Reconciler::dry_run(store.clone());
        assert!(reconciler.is_dry_run());

        let mut all = PoolWeights::new();
        all.insert("p1".to_string(), vec![weight(WALLET_A, "a/a", 99.9999)]);

        let outcomes = reconciler.reconcile(&all).await.unwrap();
        assert_eq!(outcomes[0].action, SplitAction::DryRun);
        assert_eq!(outcomes[0].weights[0].allocated_funding, 100.0);
        assert_eq!(store.split_address("p1"), None);
    }
}
