use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One currency of the daily table. `rate` is per single unit, already divided by `nominal`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub id: String,
    pub num_code: Option<String>,
    pub char_code: String,
    pub nominal: u32,
    pub name: String,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub as_of_date: NaiveDate,
    pub records: Vec<RateRecord>,
}

impl RateSnapshot {
    pub fn by_char_code(&self, char_code: &str) -> Option<&RateRecord> {
        let code = char_code.trim();
        self.records
            .iter()
            .find(|r| r.char_code.eq_ignore_ascii_case(code))
    }

    pub fn by_id(&self, id: &str) -> Option<&RateRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Rate history of one currency, ascending by date, on the same per-unit basis as
/// [`RateRecord::rate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateHistory {
    pub currency_id: String,
    pub nominal: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub points: Vec<HistoryPoint>,
}

impl RateHistory {
    pub fn first(&self) -> Option<&HistoryPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&HistoryPoint> {
        self.points.last()
    }

    pub fn min_max(&self) -> Option<(f64, f64)> {
        let first = self.points.first()?.value;
        Some(self.points.iter().fold((first, first), |(lo, hi), p| {
            (lo.min(p.value), hi.max(p.value))
        }))
    }
}
