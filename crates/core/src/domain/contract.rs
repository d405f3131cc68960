use crate::domain::rates::{HistoryPoint, RateHistory, RateRecord, RateSnapshot};
use crate::ingest::error::{FeedError, FeedStage};
use crate::ingest::types::{DailyDocument, DynamicDocument, RawRecord, RawValute};
use crate::ingest::xml::{DAILY_ENDPOINT, DYNAMIC_ENDPOINT};
use crate::time::calendar::{parse_feed_date, DateRange};
use anyhow::{ensure, Context};
use std::collections::BTreeSet;

/// Feed numbers use a decimal comma: `"12,3456"` is 12.3456.
pub fn parse_decimal_comma(s: &str) -> anyhow::Result<f64> {
    let t = s.trim().replace(',', ".");
    ensure!(!t.is_empty(), "empty decimal value");
    let v = t
        .parse::<f64>()
        .with_context(|| format!("invalid decimal value {s:?}"))?;
    ensure!(v.is_finite(), "non-finite decimal value {s:?}");
    Ok(v)
}

pub fn parse_nominal(s: &str) -> anyhow::Result<u32> {
    let t = s.trim();
    let n = t
        .parse::<u32>()
        .with_context(|| format!("invalid nominal {t:?}"))?;
    ensure!(n > 0, "nominal must be positive (got {n})");
    Ok(n)
}

pub fn per_unit(value: f64, nominal: u32) -> f64 {
    value / f64::from(nominal)
}

fn contract_error(endpoint: &str, err: anyhow::Error) -> anyhow::Error {
    FeedError::new(FeedStage::Contract, endpoint, format!("{err:#}")).into()
}

impl DailyDocument {
    pub fn validate_and_into_snapshot(self) -> anyhow::Result<RateSnapshot> {
        self.into_snapshot()
            .map_err(|err| contract_error(DAILY_ENDPOINT, err))
    }

    fn into_snapshot(self) -> anyhow::Result<RateSnapshot> {
        let as_of_date = parse_feed_date(&self.date).context("ValCurs Date")?;

        let mut seen_codes = BTreeSet::<String>::new();
        let mut records = Vec::with_capacity(self.valutes.len());
        for valute in self.valutes {
            records.push(valute.validate_and_into_record(&mut seen_codes)?);
        }

        Ok(RateSnapshot {
            as_of_date,
            records,
        })
    }
}

impl RawValute {
    fn validate_and_into_record(
        self,
        seen_codes: &mut BTreeSet<String>,
    ) -> anyhow::Result<RateRecord> {
        let id = self.id.trim().to_string();
        ensure!(!id.is_empty(), "Valute ID must be non-empty");

        let char_code = self.char_code.trim().to_ascii_uppercase();
        ensure!(!char_code.is_empty(), "CharCode must be non-empty (ID={id})");
        ensure!(
            seen_codes.insert(char_code.clone()),
            "duplicate CharCode: {char_code}"
        );

        let nominal =
            parse_nominal(&self.nominal).with_context(|| format!("{char_code} Nominal"))?;
        let value =
            parse_decimal_comma(&self.value).with_context(|| format!("{char_code} Value"))?;
        ensure!(value > 0.0, "{char_code} Value must be positive (got {value})");

        let num_code = self
            .num_code
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(RateRecord {
            id,
            num_code,
            char_code,
            nominal,
            name: self.name.trim().to_string(),
            rate: per_unit(value, nominal),
        })
    }
}

impl DynamicDocument {
    /// `None` when the upstream has no records for the range.
    pub fn validate_and_into_history(
        self,
        currency_id: &str,
        range: DateRange,
        nominal: u32,
    ) -> anyhow::Result<Option<RateHistory>> {
        self.into_history(currency_id, range, nominal)
            .map_err(|err| contract_error(DYNAMIC_ENDPOINT, err))
    }

    fn into_history(
        self,
        currency_id: &str,
        range: DateRange,
        nominal: u32,
    ) -> anyhow::Result<Option<RateHistory>> {
        ensure!(nominal > 0, "nominal must be positive (got {nominal})");
        if self.records.is_empty() {
            return Ok(None);
        }

        let mut points = Vec::with_capacity(self.records.len());
        for record in self.records {
            let point = record.validate_and_into_point(nominal)?;
            if range.contains(point.date) {
                points.push(point);
            }
        }

        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);

        if points.is_empty() {
            return Ok(None);
        }

        Ok(Some(RateHistory {
            currency_id: currency_id.to_string(),
            nominal,
            start: range.start,
            end: range.end,
            points,
        }))
    }
}

impl RawRecord {
    fn validate_and_into_point(self, nominal: u32) -> anyhow::Result<HistoryPoint> {
        let date = parse_feed_date(&self.date).context("Record Date")?;
        let value =
            parse_decimal_comma(&self.value).with_context(|| format!("Record Value on {date}"))?;
        Ok(HistoryPoint {
            date,
            value: per_unit(value, nominal),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::xml::{parse_daily, parse_dynamic};
    use chrono::NaiveDate;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, day).unwrap()
    }

    fn valute(id: &str, code: &str, nominal: &str, value: &str) -> String {
        format!(
            "<Valute ID=\"{id}\"><NumCode>000</NumCode><CharCode>{code}</CharCode>\
             <Nominal>{nominal}</Nominal><Name>{code} name</Name><Value>{value}</Value></Valute>"
        )
    }

    fn daily(valutes: &[String]) -> String {
        format!(
            "<ValCurs Date=\"17.10.2026\" name=\"Foreign Currency Market\">{}</ValCurs>",
            valutes.concat()
        )
    }

    fn dynamic(records: &[(&str, &str)]) -> String {
        let body: String = records
            .iter()
            .map(|(date, value)| {
                format!("<Record Date=\"{date}\" Id=\"R01820\"><Nominal>100</Nominal><Value>{value}</Value></Record>")
            })
            .collect();
        format!("<ValCurs ID=\"R01820\" name=\"Foreign Currency Market Dynamic\">{body}</ValCurs>")
    }

    #[test]
    fn decimal_comma_becomes_point() {
        assert_eq!(parse_decimal_comma("12,3456").unwrap(), 12.3456);
        assert_eq!(parse_decimal_comma(" 90,50 ").unwrap(), 90.5);
        assert_eq!(parse_decimal_comma("7").unwrap(), 7.0);
        assert!(parse_decimal_comma("").is_err());
        assert!(parse_decimal_comma("12,34,56").is_err());
    }

    #[test]
    fn nominal_must_be_positive() {
        assert_eq!(parse_nominal("100").unwrap(), 100);
        assert!(parse_nominal("0").is_err());
        assert!(parse_nominal("-1").is_err());
    }

    #[test]
    fn usd_rate_is_value_over_unit_nominal() {
        let text = "<ValCurs Date=\"17.10.2026\"><Valute ID=\"R01235\"><NumCode>840</NumCode>\
             <CharCode>USD</CharCode><Nominal>1</Nominal><Name>Доллар США</Name>\
             <Value>90,50</Value></Valute></ValCurs>";
        let snapshot = parse_daily(text).unwrap().validate_and_into_snapshot().unwrap();

        assert_eq!(snapshot.as_of_date, d(10, 17));
        let usd = snapshot.by_char_code("USD").unwrap();
        assert_eq!(usd.rate, 90.50);
        assert_eq!(usd.name, "Доллар США");
        assert_eq!(usd.num_code.as_deref(), Some("840"));
    }

    #[test]
    fn jpy_rate_is_divided_by_nominal() {
        let text = daily(&[valute("R01820", "JPY", "100", "60,00")]);
        let snapshot = parse_daily(&text).unwrap().validate_and_into_snapshot().unwrap();
        let jpy = snapshot.by_char_code("JPY").unwrap();
        assert_eq!(jpy.nominal, 100);
        assert!((jpy.rate - 0.60).abs() < 1e-12);
    }

    #[test]
    fn every_rate_is_value_over_nominal() {
        let cases = [("AAA", "1", "12,3456"), ("BBB", "10", "45,6"), ("CCC", "10000", "31,0742")];
        let valutes: Vec<String> = cases
            .iter()
            .enumerate()
            .map(|(i, (code, nominal, value))| valute(&format!("R{i}"), code, nominal, value))
            .collect();
        let snapshot = parse_daily(&daily(&valutes))
            .unwrap()
            .validate_and_into_snapshot()
            .unwrap();

        for (code, nominal, value) in cases {
            let r = snapshot.by_char_code(code).unwrap();
            let expected = parse_decimal_comma(value).unwrap() / nominal.parse::<f64>().unwrap();
            assert!(r.nominal > 0);
            assert!((r.rate - expected).abs() < 1e-12, "{code}");
        }
    }

    #[test]
    fn keeps_upstream_order() {
        let text = daily(&[
            valute("R1", "ZAR", "10", "45,0"),
            valute("R2", "AUD", "1", "52,0"),
        ]);
        let snapshot = parse_daily(&text).unwrap().validate_and_into_snapshot().unwrap();
        let codes: Vec<_> = snapshot.records.iter().map(|r| r.char_code.as_str()).collect();
        assert_eq!(codes, ["ZAR", "AUD"]);
    }

    #[test]
    fn rejects_duplicate_char_codes() {
        let text = daily(&[valute("R1", "USD", "1", "90,0"), valute("R2", "USD", "1", "91,0")]);
        let err = parse_daily(&text).unwrap().validate_and_into_snapshot().unwrap_err();
        let feed = err.downcast_ref::<FeedError>().unwrap();
        assert_eq!(feed.stage, FeedStage::Contract);
        assert!(feed.detail.contains("duplicate CharCode"));
    }

    #[test]
    fn rejects_zero_nominal() {
        let text = daily(&[valute("R1", "USD", "0", "90,0")]);
        assert!(parse_daily(&text).unwrap().validate_and_into_snapshot().is_err());
    }

    #[test]
    fn history_values_use_snapshot_basis() {
        let range = DateRange::ending_on(d(10, 17), 30).unwrap();
        let text = dynamic(&[("16.10.2026", "61,00")]);
        let history = parse_dynamic(&text)
            .unwrap()
            .validate_and_into_history("R01820", range, 100)
            .unwrap()
            .unwrap();

        assert_eq!(history.points.len(), 1);
        assert!((history.points[0].value - 0.61).abs() < 1e-12);
        assert_eq!(history.nominal, 100);
    }

    #[test]
    fn history_is_sorted_bounded_and_deduplicated() {
        let range = DateRange::ending_on(d(10, 17), 30).unwrap();
        let text = dynamic(&[
            ("10.10.2026", "62,00"),
            ("01.09.2026", "50,00"),
            ("03.10.2026", "61,00"),
            ("10.10.2026", "63,00"),
            ("18.10.2026", "64,00"),
        ]);
        let history = parse_dynamic(&text)
            .unwrap()
            .validate_and_into_history("R01820", range, 1)
            .unwrap()
            .unwrap();

        let dates: Vec<_> = history.points.iter().map(|p| p.date).collect();
        assert_eq!(dates, [d(10, 3), d(10, 10)]);
        assert!(history.first().unwrap().date >= range.start);
        assert!(history.last().unwrap().date <= range.end);
        assert_eq!(history.points[1].value, 62.0);
    }

    #[test]
    fn empty_history_is_absent() {
        let range = DateRange::ending_on(d(10, 17), 30).unwrap();
        let doc = parse_dynamic("<ValCurs ID=\"R01820\" name=\"Foreign Currency Market Dynamic\"/>").unwrap();
        assert!(doc
            .validate_and_into_history("R01820", range, 100)
            .unwrap()
            .is_none());
    }

    #[test]
    fn bad_history_value_is_a_contract_error() {
        let range = DateRange::ending_on(d(10, 17), 30).unwrap();
        let text = dynamic(&[("16.10.2026", "n/a")]);
        let err = parse_dynamic(&text)
            .unwrap()
            .validate_and_into_history("R01820", range, 1)
            .unwrap_err();
        assert_eq!(err.downcast_ref::<FeedError>().unwrap().stage, FeedStage::Contract);
    }
}
