//! Pool-wide metrics collection.

use super::aggregator::MetricsAggregator;
use crate::error::Result;
use crate::models::{DateWindow, PoolEntry};
use crate::store::RowStore;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing::{debug, info};

/// Collects metrics for every eligible registration of a pool.
pub struct PoolMetricsCollector {
    store: Arc<dyn RowStore>,
    aggregator: MetricsAggregator,
    show_progress: bool,
}

impl PoolMetricsCollector {
    pub fn new(store: Arc<dyn RowStore>, aggregator: MetricsAggregator, show_progress: bool) -> Self {
        Self {
            store,
            aggregator,
            show_progress,
        }
    }

    /// Metrics for each registration of `pool_id` with a valid wallet.
    ///
    /// Fails only if the registrations cannot be listed; individual
    /// projects degrade to zero metrics inside the aggregator.
    pub async fn collect(&self, pool_id: &str, window: &DateWindow) -> Result<Vec<PoolEntry>> {
        info!("Fetching metrics for pool {}", pool_id);
        let registrations = self.store.registrations_for_pool(pool_id).await?;

        let (eligible, rejected): (Vec<_>, Vec<_>) = registrations
            .into_iter()
            .partition(|registration| registration.has_valid_wallet());
        for registration in &rejected {
            debug!(
                "Skipping {}: invalid wallet address {:?}",
                registration.slug(),
                registration.wallet_address
            );
        }

        let progress = self.progress_bar(eligible.len() as u64);
        let mut entries = Vec::with_capacity(eligible.len());

        for registration in eligible {
            info!("Fetching metrics for project {}", registration.slug());
            progress.set_message(registration.slug());

            let metrics = self
                .aggregator
                .metrics_for_project(
                    &registration.artifact_namespace,
                    &registration.artifact_name,
                    window,
                )
                .await;

            entries.push(PoolEntry {
                registration,
                metrics,
            });
            progress.inc(1);
        }

        progress.finish_and_clear();
        Ok(entries)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}
