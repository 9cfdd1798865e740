//! Seed data for development databases.

use crate::error::{Error, Result};
use crate::models::{is_valid_address, FundingPool, Registration};
use crate::store::{NewPool, RowStore};
use chrono::Utc;
use tracing::info;

/// Repositories registered into the seed pool.
pub const EXAMPLE_REPOS: [&str; 5] = [
    "opensource-observer/oso",
    "ethereum-optimism/superchain-ops",
    "true-myth/true-myth",
    "gigobyte/purify",
    "fastrodev/fastro",
];

/// Insert a pool owned by `user_id` with every [`EXAMPLE_REPOS`] entry
/// registered to `wallet_address`.
pub async fn populate_db(store: &dyn RowStore, wallet_address: &str, user_id: &str) -> Result<FundingPool> {
    if !is_valid_address(wallet_address) {
        return Err(Error::Validation(format!(
            "Seed wallet is not a valid address: {}",
            wallet_address
        )));
    }
    if user_id.trim().is_empty() {
        return Err(Error::Validation("Seed user id is empty".to_string()));
    }

    let now = Utc::now();
    let pool = store
        .insert_pool(&NewPool {
            name: format!("Seed pool {}", now.format("%Y-%m-%d %H:%M")),
            description: Some(format!("{} example repositories", EXAMPLE_REPOS.len())),
            user_id: Some(user_id.to_string()),
            split_address: None,
        })
        .await?;
    info!("Inserted pool {} ({})", pool.id, pool.name);

    for repo in EXAMPLE_REPOS {
        let (namespace, name) = repo.split_once('/').unwrap_or((repo, repo));
        store
            .insert_registration(&Registration {
                pool_id: pool.id.clone(),
                user_id: user_id.to_string(),
                artifact_namespace: namespace.to_string(),
                artifact_name: name.to_string(),
                artifact_source: "GITHUB".to_string(),
                wallet_address: wallet_address.to_string(),
                referrer: None,
                created_at: Some(now),
            })
            .await?;
        info!("Registered {} in pool {}", repo, pool.id);
    }

    Ok(pool)
}
