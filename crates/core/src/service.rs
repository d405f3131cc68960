use crate::config::Settings;
use crate::domain::rates::{RateHistory, RateRecord, RateSnapshot};
use crate::ingest::cbr::CbrClient;
use crate::ingest::provider::RatesSource;
use crate::storage::cache::TtlCache;
use crate::time::calendar::{local_today, DateRange};
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HistoryKey {
    pub currency_id: String,
    pub days: u32,
    pub nominal: u32,
    pub end: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct UnknownCurrency {
    pub query: String,
}

impl fmt::Display for UnknownCurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown currency: {}", self.query)
    }
}

impl std::error::Error for UnknownCurrency {}

/// Snapshot and history fetchers over one [`RatesSource`], each memoized in its own cache.
pub struct RatesService {
    source: Arc<dyn RatesSource>,
    snapshots: TtlCache<(), RateSnapshot>,
    histories: TtlCache<HistoryKey, Option<RateHistory>>,
}

impl RatesService {
    pub fn new(source: Arc<dyn RatesSource>, ttl: Duration) -> Self {
        Self {
            source,
            snapshots: TtlCache::new(ttl),
            histories: TtlCache::new(ttl),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = CbrClient::from_settings(settings)?;
        Ok(Self::new(Arc::new(client), settings.cache_ttl()))
    }

    pub fn source_name(&self) -> &'static str {
        self.source.source_name()
    }

    pub async fn snapshot(&self) -> Result<RateSnapshot> {
        self.snapshots
            .get_or_fetch((), || async move {
                let started = Instant::now();
                let doc = self
                    .source
                    .fetch_daily()
                    .await
                    .context("fetch daily rates failed")?;
                let snapshot = doc.validate_and_into_snapshot()?;
                tracing::info!(
                    source = self.source.source_name(),
                    as_of_date = %snapshot.as_of_date,
                    currencies = snapshot.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "fetched rate snapshot"
                );
                Ok(snapshot)
            })
            .await
    }

    /// History of `currency_id` over the `days` before today, divided by `nominal`.
    /// `Ok(None)` means the upstream has no data for the range.
    pub async fn history(
        &self,
        currency_id: &str,
        days: u32,
        nominal: u32,
    ) -> Result<Option<RateHistory>> {
        self.history_on(currency_id, days, nominal, local_today())
            .await
    }

    pub async fn history_on(
        &self,
        currency_id: &str,
        days: u32,
        nominal: u32,
        today: NaiveDate,
    ) -> Result<Option<RateHistory>> {
        anyhow::ensure!(nominal > 0, "nominal must be positive (got {nominal})");
        let range = DateRange::ending_on(today, days)?;
        let key = HistoryKey {
            currency_id: currency_id.to_string(),
            days,
            nominal,
            end: range.end,
        };

        self.histories
            .get_or_fetch(key, || async move {
                let started = Instant::now();
                let doc = self
                    .source
                    .fetch_dynamic(currency_id, range)
                    .await
                    .with_context(|| format!("fetch rate history for {currency_id} failed"))?;
                let history = doc.validate_and_into_history(currency_id, range, nominal)?;
                tracing::info!(
                    source = self.source.source_name(),
                    currency_id,
                    days,
                    start = %range.start,
                    end = %range.end,
                    points = history.as_ref().map_or(0, |h| h.points.len()),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "fetched rate history"
                );
                Ok(history)
            })
            .await
    }

    /// History joined to a snapshot record by its ID, on the record's nominal basis.
    pub async fn history_for(
        &self,
        record: &RateRecord,
        days: u32,
    ) -> Result<Option<RateHistory>> {
        self.history(&record.id, days, record.nominal).await
    }

    /// Record by CharCode (case-insensitive) or upstream ID from the current snapshot.
    pub async fn resolve(&self, code_or_id: &str) -> Result<RateRecord> {
        let snapshot = self.snapshot().await?;
        snapshot
            .by_char_code(code_or_id)
            .or_else(|| snapshot.by_id(code_or_id.trim()))
            .cloned()
            .ok_or_else(|| {
                UnknownCurrency {
                    query: code_or_id.trim().to_string(),
                }
                .into()
            })
    }

    pub async fn refresh(&self) {
        let snapshots = self.snapshots.clear().await;
        let histories = self.histories.clear().await;
        tracing::info!(snapshots, histories, "rate caches cleared");
    }
}
