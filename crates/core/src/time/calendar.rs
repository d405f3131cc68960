use anyhow::Context;
use chrono::{Duration, Local, NaiveDate};

/// Date format of the `Date` attributes in the feed documents.
pub const FEED_DATE_FORMAT: &str = "%d.%m.%Y";

/// Date format of the `date_req1`/`date_req2` query parameters.
pub const REQUEST_DATE_FORMAT: &str = "%d/%m/%Y";

pub const MIN_HISTORY_DAYS: u32 = 7;
pub const MAX_HISTORY_DAYS: u32 = 360;
pub const DEFAULT_HISTORY_DAYS: u32 = 30;

/// Today on the caller's local calendar.
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Inclusive date range of a history request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// `[today - days, today]`.
    pub fn ending_on(today: NaiveDate, days: u32) -> anyhow::Result<Self> {
        anyhow::ensure!(days > 0, "history range must cover at least one day");
        let start = today
            .checked_sub_signed(Duration::days(i64::from(days)))
            .with_context(|| format!("{days} days before {today} is out of range"))?;
        Ok(Self { start, end: today })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn query_params(&self, currency_id: &str) -> [(&'static str, String); 3] {
        [
            ("date_req1", format_request_date(self.start)),
            ("date_req2", format_request_date(self.end)),
            ("VAL_NM_RQ", currency_id.to_string()),
        ]
    }
}

pub fn format_request_date(date: NaiveDate) -> String {
    date.format(REQUEST_DATE_FORMAT).to_string()
}

pub fn parse_feed_date(s: &str) -> anyhow::Result<NaiveDate> {
    let t = s.trim();
    NaiveDate::parse_from_str(t, FEED_DATE_FORMAT)
        .with_context(|| format!("invalid feed date {t:?} (expected dd.mm.yyyy)"))
}
