//! PostgREST (Supabase) implementation of the row store.

use super::{NewPool, RowStore};
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::models::{FundingPool, Registration};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const POOLS: &str = "funding_pools";
const REGISTRATIONS: &str = "pool_registrations";

/// PostgREST error body.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    message: String,
    #[serde(default)]
    details: Option<String>,
}

pub struct SupabaseStore {
    http_client: reqwest::Client,
    rest_url: String,
}

impl SupabaseStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let key = config.key.as_deref().unwrap_or_default();
        let invalid = |_| Error::Validation("Row store key contains invalid characters".to_string());

        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(key).map_err(invalid)?);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", key)).map_err(invalid)?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            http_client,
            rest_url: format!("{}/rest/v1", config.url.trim_end_matches('/')),
        })
    }

    fn table(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<PostgrestError>(&body) {
            Ok(err) => match err.details {
                Some(details) => format!("{} ({})", err.message, details),
                None => err.message,
            },
            Err(_) => format!("{}: {}", status, body),
        };
        Err(Error::Store(message))
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, filters: &[(&str, String)]) -> Result<Vec<T>> {
        debug!("select {} {:?}", table, filters);
        let request = self
            .http_client
            .get(self.table(table))
            .query(&[("select", "*")])
            .query(filters);
        let rows = self.send(request).await?.json().await?;
        Ok(rows)
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

#[async_trait]
impl RowStore for SupabaseStore {
    async fn list_pools(&self) -> Result<Vec<FundingPool>> {
        self.select(POOLS, &[("deleted_at", "is.null".to_string())])
            .await
    }

    async fn get_pool(&self, pool_id: &str) -> Result<FundingPool> {
        let pools: Vec<FundingPool> = self.select(POOLS, &[("id", eq(pool_id))]).await?;
        pools
            .into_iter()
            .next()
            .ok_or_else(|| Error::Store(format!("Pool {} not found", pool_id)))
    }

    async fn registrations_for_pool(&self, pool_id: &str) -> Result<Vec<Registration>> {
        self.select(REGISTRATIONS, &[("pool_id", eq(pool_id))]).await
    }

    async fn find_registration(&self, pool_id: &str, user_id: &str) -> Result<Option<Registration>> {
        let rows: Vec<Registration> = self
            .select(
                REGISTRATIONS,
                &[("pool_id", eq(pool_id)), ("user_id", eq(user_id))],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn find_registration_by_artifact(
        &self,
        pool_id: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Registration>> {
        let rows: Vec<Registration> = self
            .select(
                REGISTRATIONS,
                &[
                    ("pool_id", eq(pool_id)),
                    ("artifact_namespace", eq(namespace)),
                    ("artifact_name", eq(name)),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn set_split_address(&self, pool_id: &str, split_address: &str) -> Result<()> {
        let request = self
            .http_client
            .patch(self.table(POOLS))
            .query(&[("id", eq(pool_id))])
            .header("Prefer", "return=minimal")
            .json(&json!({
                "split_address": split_address,
                "updated_at": Utc::now(),
            }));
        self.send(request).await?;
        Ok(())
    }

    async fn insert_pool(&self, pool: &NewPool) -> Result<FundingPool> {
        let request = self
            .http_client
            .post(self.table(POOLS))
            .header("Prefer", "return=representation")
            .json(&[pool]);
        let rows: Vec<FundingPool> = self.send(request).await?.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| Error::Store("Insert into funding_pools returned no row".to_string()))
    }

    async fn insert_registration(&self, registration: &Registration) -> Result<()> {
        let request = self
            .http_client
            .post(self.table(REGISTRATIONS))
            .header("Prefer", "return=minimal")
            .json(&[registration]);
        self.send(request).await?;
        Ok(())
    }
}
