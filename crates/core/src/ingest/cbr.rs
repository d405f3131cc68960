use crate::config::Settings;
use crate::ingest::error::{FeedError, FeedStage};
use crate::ingest::provider::RatesSource;
use crate::ingest::types::{DailyDocument, DynamicDocument};
use crate::ingest::xml::{self, DAILY_ENDPOINT, DYNAMIC_ENDPOINT};
use crate::time::calendar::DateRange;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use std::time::{Duration, Instant};

const USER_AGENT: &str = concat!("cbr_rates/", env!("CARGO_PKG_VERSION"));
const BACKOFF_BASE: Duration = Duration::from_secs(1);

/// `base`, `2 * base`, `4 * base`, ... before retry number `attempt` (1-based).
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * (1u32 << (attempt.saturating_sub(1)).min(16))
}

#[derive(Debug, Clone)]
pub struct CbrClient {
    http: reqwest::Client,
    daily_url: String,
    dynamic_url: String,
    retries: u32,
    backoff_base: Duration,
}

impl CbrClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build CBR http client")?;

        Ok(Self {
            http,
            daily_url: settings.daily_url.clone(),
            dynamic_url: settings.dynamic_url.clone(),
            retries: settings.retries.max(1),
            backoff_base: BACKOFF_BASE,
        })
    }

    async fn get_once(
        &self,
        endpoint: &'static str,
        url: &str,
        query: &[(&'static str, String)],
    ) -> std::result::Result<Vec<u8>, Attempt> {
        let res = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|err| {
                Attempt::retryable(FeedError::new(
                    FeedStage::Http,
                    endpoint,
                    format!("request failed: {err}"),
                ))
            })?;

        let status = res.status();
        let bytes = res.bytes().await.map_err(|err| {
            Attempt::retryable(FeedError::new(
                FeedStage::Http,
                endpoint,
                format!("failed to read response body: {err}"),
            ))
        })?;

        if !status.is_success() {
            let err = FeedError::new(FeedStage::Http, endpoint, format!("HTTP {status}"))
                .with_raw_body(String::from_utf8_lossy(&bytes).into_owned());
            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            return Err(Attempt { err, retryable });
        }

        Ok(bytes.to_vec())
    }

    /// GET with exponential backoff on transport failures and 429/5xx.
    async fn get_text(
        &self,
        endpoint: &'static str,
        url: &str,
        query: &[(&'static str, String)],
    ) -> Result<String> {
        let started = Instant::now();
        let mut attempt: u32 = 0;
        let bytes = loop {
            attempt += 1;
            match self.get_once(endpoint, url, query).await {
                Ok(bytes) => break bytes,
                Err(Attempt { err, retryable }) => {
                    if !retryable || attempt >= self.retries {
                        return Err(err.into());
                    }
                    let backoff = backoff_delay(self.backoff_base, attempt);
                    tracing::warn!(
                        attempt,
                        ?backoff,
                        endpoint,
                        error = %err,
                        "CBR request failed; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        };

        let text = xml::decode_windows_1251(&bytes);
        tracing::debug!(
            endpoint,
            attempt,
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "CBR response received"
        );
        Ok(text)
    }
}

struct Attempt {
    err: FeedError,
    retryable: bool,
}

impl Attempt {
    fn retryable(err: FeedError) -> Self {
        Self {
            err,
            retryable: true,
        }
    }
}

#[async_trait::async_trait]
impl RatesSource for CbrClient {
    fn source_name(&self) -> &'static str {
        "cbr_xml"
    }

    async fn fetch_daily(&self) -> Result<DailyDocument> {
        let text = self.get_text(DAILY_ENDPOINT, &self.daily_url, &[]).await?;
        Ok(xml::parse_daily(&text)?)
    }

    async fn fetch_dynamic(&self, currency_id: &str, range: DateRange) -> Result<DynamicDocument> {
        let params = range.query_params(currency_id);
        let text = self
            .get_text(DYNAMIC_ENDPOINT, &self.dynamic_url, &params)
            .await?;
        Ok(xml::parse_dynamic(&text)?)
    }
}
