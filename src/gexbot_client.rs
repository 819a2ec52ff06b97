use crate::config;
use crate::models::GexSnapshot;
use anyhow::{Context, Result};
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::Retry;
use tracing::{debug, warn};

// -----------------------------------------------
// CLIENT WRAPPER
// -----------------------------------------------
pub struct GexBotClient {
    client: Client,
    api_key: String,
}

impl GexBotClient {
    pub fn new(api_key: String) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            api_key,
        })
    }

    pub fn from_env() -> Result<Self> {
        let key = config::api_key().context("GEXBOT_API_KEY is not set")?;
        Self::new(key)
    }

    /// Generic retry fetch with JSON body validation
    async fn fetch_json(&self, url: &str) -> Result<String> {
        let backoff = ExponentialBackoff::from_millis(config::RETRY_BASE_DELAY_MS)
            .factor(config::RETRY_FACTOR)
            .max_delay(Duration::from_secs(config::RETRY_MAX_DELAY_SECS))
            .take(config::RETRY_MAX_ATTEMPTS);

        Retry::spawn(backoff, || async {
            let res = self
                .client
                .get(url)
                .send()
                .await
                .context("Request send failed")?;

            let status = res.status();

            if status.is_success() {
                let text = res.text().await.context("Failed to read body")?;

                // Upstream occasionally serves an HTML error page with a 200
                let trimmed = text.trim();
                if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
                    let preview: String = text.chars().take(200).collect();
                    anyhow::bail!("Non-JSON response: {}", preview);
                }

                Ok(text)
            } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                warn!(%status, "retryable upstream error");
                anyhow::bail!("Retryable error: {}", status)
            } else {
                let body = res.text().await.unwrap_or_default();
                let preview: String = body.chars().take(200).collect();
                anyhow::bail!("Client error {}: {}", status, preview)
            }
        })
        .await
    }

    /// Fetch the per-strike GEX snapshot for one ticker / aggregation period.
    pub async fn fetch_snapshot(&self, ticker: &str, aggregation: &str) -> Result<GexSnapshot> {
        let url = config::snapshot_url(ticker, aggregation, &self.api_key);
        let text = self.fetch_json(&url).await?;
        let snapshot: GexSnapshot =
            serde_json::from_str(&text).context("Failed to parse GEX snapshot")?;

        debug!(ticker, aggregation, strikes = snapshot.strikes.len(), "snapshot fetched");
        Ok(snapshot)
    }

    /// Fetch the externally-computed major walls. A failure here degrades to
    /// "no overlay" at the call site rather than aborting the run.
    pub async fn fetch_majors(&self, ticker: &str, aggregation: &str) -> Result<Value> {
        let url = config::majors_url(ticker, aggregation, &self.api_key);
        let text = self.fetch_json(&url).await?;
        let data: Value = serde_json::from_str(&text).context("Failed to parse majors payload")?;

        Ok(data)
    }
}

// -----------------------------------------------
// HTTP CLIENT BUILDER
// -----------------------------------------------
fn build_client() -> Result<Client> {
    let mut headers = header::HeaderMap::new();
    headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

    Ok(Client::builder()
        .default_headers(headers)
        .user_agent(config::USER_AGENT)
        .timeout(config::HTTP_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?)
}
