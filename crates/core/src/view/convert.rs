use crate::domain::rates::RateRecord;
use crate::BASE_CURRENCY;
use anyhow::ensure;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// RUB → selected currency.
    #[default]
    FromBase,
    /// Selected currency → RUB.
    ToBase,
}

impl Direction {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "from_base" | "from_rub" => Ok(Direction::FromBase),
            "to_base" | "to_rub" => Ok(Direction::ToBase),
            other => anyhow::bail!("unknown direction {other:?} (expected from_base or to_base)"),
        }
    }

    pub fn label(self, char_code: &str) -> String {
        match self {
            Direction::FromBase => format!("{BASE_CURRENCY} → {char_code}"),
            Direction::ToBase => format!("{char_code} → {BASE_CURRENCY}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub char_code: String,
    pub direction: Direction,
    pub rate: f64,
    pub amount: f64,
    pub converted: f64,
}

impl Conversion {
    pub fn summary(&self) -> String {
        let (from, to) = match self.direction {
            Direction::FromBase => (BASE_CURRENCY, self.char_code.as_str()),
            Direction::ToBase => (self.char_code.as_str(), BASE_CURRENCY),
        };
        format!("{:.2} {from} = {:.2} {to}", self.amount, self.converted)
    }
}

pub fn convert(
    record: &RateRecord,
    amount: f64,
    direction: Direction,
) -> anyhow::Result<Conversion> {
    ensure!(amount.is_finite(), "amount must be a finite number");
    ensure!(amount >= 0.0, "amount must not be negative (got {amount})");
    ensure!(
        record.rate.is_finite() && record.rate > 0.0,
        "{} has no usable rate",
        record.char_code
    );

    let converted = match direction {
        Direction::FromBase => amount / record.rate,
        Direction::ToBase => amount * record.rate,
    };

    Ok(Conversion {
        char_code: record.char_code.clone(),
        direction,
        rate: record.rate,
        amount,
        converted,
    })
}
