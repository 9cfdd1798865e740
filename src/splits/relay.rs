//! HTTP relay that submits split transactions on chain.

use super::{CreateSplitConfig, CreatedSplit, SplitsClient, UpdateSplitConfig};
use crate::config::SplitsConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Response;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    split_address: String,
    #[serde(default)]
    event: Value,
}

#[derive(Debug, Deserialize)]
struct UpdateResponse {
    #[serde(default)]
    event: Value,
}

pub struct RelayClient {
    http_client: reqwest::Client,
    relay_url: String,
}

impl RelayClient {
    pub fn new(config: &SplitsConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(ref key) = config.api_key {
            let value = HeaderValue::from_str(key)
                .map_err(|_| Error::Validation("Splits API key contains invalid characters".to_string()))?;
            headers.insert("x-api-key", value);
        }

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            http_client,
            relay_url: config.relay_url.trim_end_matches('/').to_string(),
        })
    }

    async fn check(response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Splits(format!("relay answered {}: {}", status, body)))
    }
}

/// Render a confirmation event for logs.
fn event_text(event: Value) -> String {
    match event {
        Value::Null => "<none>".to_string(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[async_trait]
impl SplitsClient for RelayClient {
    async fn create_split(&self, config: &CreateSplitConfig) -> Result<CreatedSplit> {
        let url = format!("{}/splits", self.relay_url);
        debug!("POST {} with {} recipients", url, config.recipients.len());

        let response = self.http_client.post(&url).json(config).send().await?;
        let created: CreateResponse = Self::check(response).await?.json().await?;

        Ok(CreatedSplit {
            split_address: created.split_address,
            event: event_text(created.event),
        })
    }

    async fn update_split(&self, config: &UpdateSplitConfig) -> Result<String> {
        let url = format!("{}/splits/{}", self.relay_url, config.split_address);
        debug!("PUT {} with {} recipients", url, config.recipients.len());

        let response = self.http_client.put(&url).json(config).send().await?;
        let updated: UpdateResponse = Self::check(response).await?.json().await?;

        Ok(event_text(updated.event))
    }
}
