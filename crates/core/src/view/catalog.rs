use crate::domain::rates::RateRecord;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Name,
    Rate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortKey {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(SortKey::Name),
            "rate" => Ok(SortKey::Rate),
            other => anyhow::bail!("unknown sort key {other:?} (expected name or rate)"),
        }
    }
}

impl SortOrder {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => anyhow::bail!("unknown sort order {other:?} (expected asc or desc)"),
        }
    }
}

/// CharCode contains the uppercased query, or Name contains it ignoring case. Blank matches all.
pub fn matches_query(record: &RateRecord, query: &str) -> bool {
    let q = query.trim();
    if q.is_empty() {
        return true;
    }
    record.char_code.contains(&q.to_uppercase())
        || record.name.to_lowercase().contains(&q.to_lowercase())
}

pub fn search<'a>(records: &'a [RateRecord], query: &str) -> Vec<&'a RateRecord> {
    records.iter().filter(|r| matches_query(r, query)).collect()
}

/// Stable: records that compare equal keep their relative order in either direction.
pub fn sort_records(records: &mut [&RateRecord], key: SortKey, order: SortOrder) {
    records.sort_by(|a, b| {
        let ord = compare(a, b, key);
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}

fn compare(a: &RateRecord, b: &RateRecord, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => a.name.cmp(&b.name),
        SortKey::Rate => a.rate.total_cmp(&b.rate),
    }
}

pub fn search_sorted<'a>(
    records: &'a [RateRecord],
    query: &str,
    key: SortKey,
    order: SortOrder,
) -> Vec<&'a RateRecord> {
    let mut out = search(records, query);
    sort_records(&mut out, key, order);
    out
}

pub fn list_label(record: &RateRecord) -> String {
    format!("{} - {}", record.char_code, record.name)
}

pub fn rate_label(record: &RateRecord) -> String {
    format!("{:.3} ₽", record.rate)
}
