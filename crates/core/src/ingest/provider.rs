use crate::ingest::types::{DailyDocument, DynamicDocument};
use crate::time::calendar::DateRange;
use anyhow::Result;

/// Upstream of the rate tables. Implementations return parsed but not yet validated documents;
/// normalization happens in [`crate::domain::contract`].
#[async_trait::async_trait]
pub trait RatesSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch_daily(&self) -> Result<DailyDocument>;

    async fn fetch_dynamic(&self, currency_id: &str, range: DateRange) -> Result<DynamicDocument>;
}
