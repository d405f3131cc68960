use crate::domain::rates::{HistoryPoint, RateHistory};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
}

impl Trend {
    /// Up when the later value is not below the earlier one.
    pub fn between(from: f64, to: f64) -> Self {
        if to >= from {
            Trend::Up
        } else {
            Trend::Down
        }
    }

    pub fn color_name(self) -> &'static str {
        match self {
            Trend::Up => "green",
            Trend::Down => "red",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartSegment {
    pub from: HistoryPoint,
    pub to: HistoryPoint,
    pub trend: Trend,
}

/// One segment per consecutive pair of points; fewer than two points yield nothing.
pub fn segments(history: &RateHistory) -> Vec<ChartSegment> {
    history
        .points
        .windows(2)
        .map(|w| ChartSegment {
            from: w[0],
            to: w[1],
            trend: Trend::between(w[0].value, w[1].value),
        })
        .collect()
}

/// Lower and upper y bounds with 10% padding so a flat series still has height.
pub fn value_bounds(history: &RateHistory) -> Option<(f64, f64)> {
    let (lo, hi) = history.min_max()?;
    let padding = ((hi - lo) * 0.1).max(lo.abs() * 1e-3).max(1e-8);
    Some((lo - padding, hi + padding))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn history(values: &[f64]) -> RateHistory {
        let start = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
        let points = values
            .iter()
            .enumerate()
            .map(|(i, v)| HistoryPoint {
                date: start + chrono::Duration::days(i as i64),
                value: *v,
            })
            .collect();
        RateHistory {
            currency_id: "R01235".to_string(),
            nominal: 1,
            start,
            end: start + chrono::Duration::days(values.len() as i64),
            points,
        }
    }

    #[test]
    fn colors_each_consecutive_pair() {
        let segs = segments(&history(&[90.0, 91.0, 91.0, 89.5]));
        let trends: Vec<_> = segs.iter().map(|s| s.trend).collect();
        assert_eq!(trends, [Trend::Up, Trend::Up, Trend::Down]);
        assert_eq!(segs[2].from.value, 91.0);
        assert_eq!(segs[2].to.value, 89.5);
        assert_eq!(Trend::Down.color_name(), "red");
    }

    #[test]
    fn single_point_has_no_segments() {
        assert!(segments(&history(&[90.0])).is_empty());
    }

    #[test]
    fn bounds_pad_flat_series() {
        let (lo, hi) = value_bounds(&history(&[90.0, 90.0])).unwrap();
        assert!(lo < 90.0 && hi > 90.0);

        let (lo, hi) = value_bounds(&history(&[80.0, 90.0])).unwrap();
        assert!((lo - 79.0).abs() < 1e-9);
        assert!((hi - 91.0).abs() < 1e-9);
    }
}
