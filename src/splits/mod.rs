//! Split distribution collaborator.
//!
//! A split target routes incoming funds to a list of recipients by
//! percentage. The reconciler creates or updates one per pool through
//! [`SplitsClient`].

pub mod relay;

pub use relay::RelayClient;

use crate::error::Result;
use crate::models::FundingWeight;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Distributor fee applied to every split we manage.
pub const DISTRIBUTOR_FEE_PERCENT: f64 = 0.0;

/// A payout recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub address: String,
    pub percent_allocation: f64,
}

impl Recipient {
    /// Recipient list for a weight list, in the same order.
    pub fn from_weights(weights: &[FundingWeight]) -> Vec<Recipient> {
        weights
            .iter()
            .map(|weight| Recipient {
                address: weight.contributor.wallet.clone(),
                percent_allocation: weight.allocated_funding,
            })
            .collect()
    }
}

/// How funds leave the split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitType {
    #[default]
    Push,
    Pull,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSplitConfig {
    pub recipients: Vec<Recipient>,
    pub distributor_fee_percent: f64,
    pub split_type: SplitType,
    pub owner_address: String,
    pub creator_address: String,
    pub chain_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSplitConfig {
    pub split_address: String,
    pub recipients: Vec<Recipient>,
    pub distributor_fee_percent: f64,
}

/// Outcome of a create: the new target and the confirmation event.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedSplit {
    pub split_address: String,
    pub event: String,
}

#[async_trait]
pub trait SplitsClient: Send + Sync {
    async fn create_split(&self, config: &CreateSplitConfig) -> Result<CreatedSplit>;

    /// Replace the recipients of an existing split. Returns the confirmation event.
    async fn update_split(&self, config: &UpdateSplitConfig) -> Result<String>;
}
