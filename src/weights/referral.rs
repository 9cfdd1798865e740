//! Referral redistribution and merging of weight entries.

use crate::models::{Contributor, FundingWeight, PoolEntry, Registration, WeightKind};
use crate::store::RowStore;
use std::collections::HashMap;
use tracing::warn;

/// Size of the funding pool weights are expressed against.
pub const FUNDING_POOL: f64 = 100.0;

/// Percent of a referred contributor's scaled share it keeps.
pub const REFERRED_KEEPS: f64 = 99.0;

/// Round to 4 decimal places.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Expand each share into weight entries, routing referral cuts.
///
/// An unreferred contributor gets `share * 100` as a base entry. A
/// contributor whose referrer is registered in the same pool keeps
/// `share * 99` and the referrer receives `share`; both entries are tagged
/// as referrer entries. When the referrer cannot be resolved the referral
/// is ignored.
pub async fn distribute(
    store: &dyn RowStore,
    pool_id: &str,
    entries: &[PoolEntry],
    shares: &[f64],
) -> Vec<FundingWeight> {
    let mut weights = Vec::with_capacity(entries.len());

    for (entry, &share) in entries.iter().zip(shares) {
        let registration = &entry.registration;
        let contributor = Contributor::from(registration);

        let referrer = match registration.referrer_id() {
            Some(referrer_id) => resolve_referrer(store, pool_id, registration, &referrer_id).await,
            None => None,
        };

        match referrer {
            Some(referrer) => {
                weights.push(FundingWeight {
                    contributor: Contributor::from(&referrer),
                    kind: WeightKind::Referrer,
                    allocated_funding: share,
                });
                weights.push(FundingWeight {
                    contributor,
                    kind: WeightKind::Referrer,
                    allocated_funding: share * REFERRED_KEEPS,
                });
            }
            None => weights.push(FundingWeight {
                contributor,
                kind: WeightKind::Base,
                allocated_funding: share * 100.0,
            }),
        }
    }

    weights
}

async fn resolve_referrer(
    store: &dyn RowStore,
    pool_id: &str,
    registration: &Registration,
    referrer_id: &str,
) -> Option<Registration> {
    match store.find_registration(pool_id, referrer_id).await {
        Ok(Some(referrer)) if referrer.has_valid_wallet() => Some(referrer),
        Ok(Some(referrer)) => {
            warn!(
                "Referrer {} of {} has an invalid wallet {:?}; referral ignored",
                referrer_id,
                registration.slug(),
                referrer.wallet_address
            );
            None
        }
        Ok(None) => {
            warn!(
                "Referrer {} of {} is not registered in pool {}; referral ignored",
                referrer_id,
                registration.slug(),
                pool_id
            );
            None
        }
        Err(e) => {
            warn!(
                "Could not look up referrer {} of {}: {}; referral ignored",
                referrer_id,
                registration.slug(),
                e
            );
            None
        }
    }
}

/// Sum entries belonging to the same contributor, keeping first-seen order.
///
/// A merged entry is `base` if any of its parts is.
pub fn merge(weights: Vec<FundingWeight>) -> Vec<FundingWeight> {
    let mut index: HashMap<Contributor, usize> = HashMap::new();
    let mut merged: Vec<FundingWeight> = Vec::with_capacity(weights.len());

    for weight in weights {
        match index.get(&weight.contributor) {
            Some(&i) => {
                let existing = &mut merged[i];
                existing.allocated_funding += weight.allocated_funding;
                if weight.kind == WeightKind::Base {
                    existing.kind = WeightKind::Base;
                }
            }
            None => {
                index.insert(weight.contributor.clone(), merged.len());
                merged.push(weight);
            }
        }
    }

    merged
}

/// Scale to the funding pool, round, and sort by allocation (largest first).
pub fn finalize(mut weights: Vec<FundingWeight>) -> Vec<FundingWeight> {
    for weight in &mut weights {
        weight.allocated_funding = round4(weight.allocated_funding / 100.0 * FUNDING_POOL);
    }
    weights.sort_by(|a, b| {
        b.allocated_funding
            .partial_cmp(&a.allocated_funding)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    weights
}
