//! Row store collaborator.
//!
//! Pools and registrations live in a PostgREST-fronted database. The
//! pipeline only talks to it through [`RowStore`].

pub mod supabase;

pub use supabase::SupabaseStore;

use crate::error::Result;
use crate::models::{FundingPool, Registration};
use async_trait::async_trait;
use serde::Serialize;

/// Fields supplied when inserting a pool; the store assigns the id.
#[derive(Debug, Clone, Serialize)]
pub struct NewPool {
    pub name: String,
    pub description: Option<String>,
    pub user_id: Option<String>,
    pub split_address: Option<String>,
}

#[async_trait]
pub trait RowStore: Send + Sync {
    /// All pools that are not soft-deleted.
    async fn list_pools(&self) -> Result<Vec<FundingPool>>;

    /// A single pool; missing pools are an error.
    async fn get_pool(&self, pool_id: &str) -> Result<FundingPool>;

    async fn registrations_for_pool(&self, pool_id: &str) -> Result<Vec<Registration>>;

    /// The registration `user_id` holds in `pool_id`, if any.
    async fn find_registration(&self, pool_id: &str, user_id: &str) -> Result<Option<Registration>>;

    /// The registration of `namespace/name` in `pool_id`, if any.
    async fn find_registration_by_artifact(
        &self,
        pool_id: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Registration>>;

    async fn set_split_address(&self, pool_id: &str, split_address: &str) -> Result<()>;

    async fn insert_pool(&self, pool: &NewPool) -> Result<FundingPool>;

    async fn insert_registration(&self, registration: &Registration) -> Result<()>;
}
