use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::fmt;

use crate::processor::{Dimension, Measure, ProcessorError, Result, Value};

/// Opaque store identifier. Compared and grouped as a label, never summed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct StoreId(String);

impl StoreId {
    pub fn new(label: impl Into<String>) -> Self {
        StoreId(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A normalized sale
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesRecord {
    pub store_id: StoreId,
    pub city: String,
    pub date: NaiveDate,
    pub unit_price: f64,
    pub quantity: u64,
}

/// A sale with its derived columns.
///
/// The only way to build one is [`EnrichedRecord::derive`], so `revenue` and
/// `quarter` always agree with the underlying record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    record: SalesRecord,
    revenue: f64,
    quarter: u32,
}

impl EnrichedRecord {
    pub fn derive(record: SalesRecord) -> Self {
        let revenue = record.unit_price * record.quantity as f64;
        let quarter = quarter_of(record.date.month());
        EnrichedRecord {
            record,
            revenue,
            quarter,
        }
    }

    pub fn record(&self) -> &SalesRecord {
        &self.record
    }

    pub fn store_id(&self) -> &StoreId {
        &self.record.store_id
    }

    pub fn city(&self) -> &str {
        &self.record.city
    }

    pub fn date(&self) -> NaiveDate {
        self.record.date
    }

    pub fn unit_price(&self) -> f64 {
        self.record.unit_price
    }

    pub fn quantity(&self) -> u64 {
        self.record.quantity
    }

    pub fn revenue(&self) -> f64 {
        self.revenue
    }

    /// Calendar quarter, 1..=4
    pub fn quarter(&self) -> u32 {
        self.quarter
    }

    pub fn measure(&self, measure: Measure) -> f64 {
        match measure {
            Measure::UnitPrice => self.unit_price(),
            Measure::Quantity => self.quantity() as f64,
            Measure::Revenue => self.revenue,
        }
    }

    /// Exact integer value of an integer measure; `None` for fractional
    /// measures or a quantity beyond `i64::MAX`
    pub fn measure_i64(&self, measure: Measure) -> Option<i64> {
        match measure {
            Measure::Quantity => i64::try_from(self.quantity()).ok(),
            Measure::UnitPrice | Measure::Revenue => None,
        }
    }

    /// [`measure_i64`](Self::measure_i64) that fails instead of returning `None`
    pub(crate) fn checked_i64(&self, measure: Measure) -> Result<i64> {
        if !measure.is_integer() {
            return Err(ProcessorError::InvalidColumn(measure.name().to_string()));
        }
        self.measure_i64(measure).ok_or_else(|| {
            ProcessorError::Overflow(format!(
                "{measure} {} exceeds {}",
                self.quantity(),
                i64::MAX
            ))
        })
    }

    pub fn measure_value(&self, measure: Measure) -> Value {
        match self.measure_i64(measure) {
            Some(v) => Value::Int(v),
            None => Value::Float(self.measure(measure)),
        }
    }

    pub fn key_part(&self, dimension: Dimension) -> KeyPart {
        match dimension {
            Dimension::City => KeyPart::Label(self.record.city.clone()),
            Dimension::StoreId => KeyPart::Label(self.record.store_id.as_str().to_string()),
            Dimension::Year => KeyPart::Number(self.record.date.year() as i64),
            Dimension::Month => KeyPart::Number(self.record.date.month() as i64),
            Dimension::Quarter => KeyPart::Number(self.quarter as i64),
            Dimension::Day => KeyPart::Number(self.record.date.day() as i64),
        }
    }

    pub fn dimension_value(&self, dimension: Dimension) -> Value {
        match self.key_part(dimension) {
            KeyPart::Label(s) => Value::Str(s),
            KeyPart::Number(n) => Value::Int(n),
        }
    }
}

/// 1-based calendar quarter of a 1-based month
pub fn quarter_of(month: u32) -> u32 {
    month.div_ceil(3)
}

/// One component of a group key.
///
/// All parts at one key position come from the same dimension, so the
/// derived ordering is lexical for labels and chronological for calendar
/// numbers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum KeyPart {
    Label(String),
    Number(i64),
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Label(s) => f.write_str(s),
            KeyPart::Number(n) => write!(f, "{n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(month: u32, unit_price: f64, quantity: u64) -> SalesRecord {
        SalesRecord {
            store_id: StoreId::new("1520"),
            city: "Natal".into(),
            date: NaiveDate::from_ymd_opt(2019, month, 1).unwrap(),
            unit_price,
            quantity,
        }
    }

    #[test]
    fn test_quarter_boundaries() {
        let expected = [1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4];
        for (month, q) in (1..=12).zip(expected) {
            assert_eq!(quarter_of(month), q, "month {month}");
        }
    }

    #[test]
    fn test_revenue_is_price_times_quantity() {
        let r = EnrichedRecord::derive(sale(5, 12.5, 4));
        assert_eq!(r.revenue(), 50.0);
        assert_eq!(r.quarter(), 2);

        let zero = EnrichedRecord::derive(sale(11, 99.9, 0));
        assert_eq!(zero.revenue(), 0.0);
        assert_eq!(zero.quarter(), 4);
    }

    #[test]
    fn test_key_parts() {
        let r = EnrichedRecord::derive(sale(8, 1.0, 1));
        assert_eq!(r.key_part(Dimension::Year), KeyPart::Number(2019));
        assert_eq!(r.key_part(Dimension::Month), KeyPart::Number(8));
        assert_eq!(r.key_part(Dimension::Quarter), KeyPart::Number(3));
        assert_eq!(
            r.key_part(Dimension::StoreId),
            KeyPart::Label("1520".into())
        );
    }
}
