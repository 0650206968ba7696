//! Raw table → typed [`SalesRecord`]s.
//!
//! Date cells are decoded with a fixed convention:
//!
//! - text: ISO `YYYY-MM-DD`, optionally followed by a `HH:MM:SS` time part
//!   (space or `T` separated) and a UTC offset or `Z`, all of which are
//!   discarded: the calendar date is taken as written, not shifted to UTC;
//! - integer: Unix epoch nanoseconds, truncated to the UTC calendar date;
//! - float: spreadsheet serial day number counted from 1899-12-30, fractional
//!   part (time of day) discarded.

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, warn};

use crate::processor::{
    Column, ProcessorError, Result, Value,
    raw::{RawRecord, RawTable},
    record::{SalesRecord, StoreId},
};

/// Missing cells per column, counted on the raw input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NullReport {
    pub store_id: usize,
    pub city: usize,
    pub date: usize,
    pub unit_price: usize,
    pub quantity: usize,
}

impl NullReport {
    pub fn count(raw: &RawTable) -> Self {
        let mut report = NullReport::default();
        for r in &raw.records {
            report.store_id += r.store_id.is_none() as usize;
            report.city += r.city.is_none() as usize;
            report.date += r.date.is_none() as usize;
            report.unit_price += r.unit_price.is_none() as usize;
            report.quantity += r.quantity.is_none() as usize;
        }
        report
    }

    pub fn columns(&self) -> [(Column, usize); 5] {
        [
            (Column::StoreId, self.store_id),
            (Column::City, self.city),
            (Column::Date, self.date),
            (Column::UnitPrice, self.unit_price),
            (Column::Quantity, self.quantity),
        ]
    }

    pub fn total(&self) -> usize {
        self.columns().iter().map(|(_, n)| n).sum()
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedTable {
    pub records: Vec<SalesRecord>,
    pub nulls: NullReport,
}

/// Normalizes every raw row. No rows are dropped: empty labels stay empty,
/// empty numbers become zero. An undecodable or missing date fails the
/// whole table.
pub fn normalize(raw: &RawTable) -> Result<NormalizedTable> {
    let nulls = NullReport::count(raw);
    if nulls.total() > 0 {
        for (column, n) in nulls.columns() {
            if n > 0 {
                warn!(column = column.name(), missing = n, "missing values");
            }
        }
    }

    let records = raw
        .records
        .iter()
        .enumerate()
        .map(|(i, r)| normalize_record(i + 1, r))
        .collect::<Result<Vec<_>>>()?;

    debug!(rows = records.len(), "normalized sales table");
    Ok(NormalizedTable { records, nulls })
}

fn normalize_record(row: usize, raw: &RawRecord) -> Result<SalesRecord> {
    let date = match &raw.date {
        Some(v) => parse_date(v).map_err(|reason| ProcessorError::TypeConversion {
            row,
            column: "date",
            value: v.to_string(),
            reason,
        })?,
        None => {
            return Err(ProcessorError::TypeConversion {
                row,
                column: "date",
                value: String::new(),
                reason: "missing date".into(),
            });
        }
    };

    Ok(SalesRecord {
        store_id: raw.store_id.as_ref().map(store_label).unwrap_or_default(),
        city: raw.city.as_deref().map(str::trim).unwrap_or("").to_string(),
        date,
        unit_price: raw.unit_price.unwrap_or(0.0),
        quantity: raw.quantity.unwrap_or(0),
    })
}

/// Store ids become labels; integral floats lose their `.0`
pub fn store_label(v: &Value) -> StoreId {
    match v {
        Value::Int(i) => StoreId::new(i.to_string()),
        Value::Float(f) if f.is_finite() && f.fract() == 0.0 => {
            StoreId::new(format!("{}", *f as i64))
        }
        Value::Float(f) => StoreId::new(f.to_string()),
        Value::Str(s) => StoreId::new(s.trim()),
    }
}

pub fn parse_date(v: &Value) -> std::result::Result<NaiveDate, String> {
    match v {
        Value::Str(s) => parse_date_text(s.trim()),
        Value::Int(nanos) => Ok(DateTime::from_timestamp_nanos(*nanos).date_naive()),
        Value::Float(serial) => serial_to_date(*serial),
    }
}

fn parse_date_text(s: &str) -> std::result::Result<NaiveDate, String> {
    let day = s.get(..10).ok_or_else(|| "expected YYYY-MM-DD".to_string())?;
    let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|e| e.to_string())?;
    if s.len() == 10 {
        return Ok(date);
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
        .ok_or_else(|| "trailing text is not a HH:MM:SS time or RFC 3339 timestamp".to_string())
}

fn serial_to_date(serial: f64) -> std::result::Result<NaiveDate, String> {
    if !serial.is_finite() || serial < 0.0 {
        return Err("not a valid spreadsheet serial date".into());
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).ok_or("bad serial epoch")?;
    epoch
        .checked_add_days(Days::new(serial.floor() as u64))
        .ok_or_else(|| "serial date out of range".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn raw(store: Value, date: Value) -> RawRecord {
        RawRecord {
            store_id: Some(store),
            city: Some("Recife".into()),
            date: Some(date),
            unit_price: Some(10.0),
            quantity: Some(3),
        }
    }

    #[test]
    fn test_date_conventions_agree() {
        let expected = ymd(2019, 1, 15);
        assert_eq!(parse_date(&Value::Str("2019-01-15".into())), Ok(expected));
        assert_eq!(
            parse_date(&Value::Str("2019-01-15 13:45:00".into())),
            Ok(expected)
        );
        assert_eq!(
            parse_date(&Value::Str("2019-01-15T00:00:00".into())),
            Ok(expected)
        );
        assert_eq!(
            parse_date(&Value::Str("2019-01-15T10:00:00Z".into())),
            Ok(expected)
        );
        // local date as written, not converted to UTC
        assert_eq!(
            parse_date(&Value::Str("2019-01-15T23:30:00.250-03:00".into())),
            Ok(expected)
        );
        // 2019-01-15T00:00:00Z
        assert_eq!(
            parse_date(&Value::Int(1_547_510_400_000_000_000)),
            Ok(expected)
        );
        assert_eq!(parse_date(&Value::Float(43480.75)), Ok(expected));
    }

    #[test]
    fn test_bad_dates_are_rejected() {
        for v in [
            Value::Str("15/01/2019".into()),
            Value::Str("2019-13-01".into()),
            Value::Str("2019-01-15 noon".into()),
            Value::Float(-1.0),
            Value::Float(f64::NAN),
        ] {
            assert!(parse_date(&v).is_err(), "{v:?}");
        }
    }

    #[test]
    fn test_store_id_becomes_label() {
        assert_eq!(store_label(&Value::Int(1520)).as_str(), "1520");
        assert_eq!(store_label(&Value::Float(1520.0)).as_str(), "1520");
        assert_eq!(store_label(&Value::Str(" 853 ".into())).as_str(), "853");
    }

    #[test]
    fn test_normalize_reports_nulls_without_dropping_rows() {
        let mut partial = raw(Value::Int(1), Value::Str("2018-03-10".into()));
        partial.city = None;
        partial.quantity = None;
        let table: RawTable = vec![
            raw(Value::Int(1), Value::Str("2019-01-15".into())),
            partial,
        ]
        .into_iter()
        .collect();

        let normalized = normalize(&table).unwrap();
        assert_eq!(normalized.records.len(), 2);
        assert_eq!(normalized.nulls.city, 1);
        assert_eq!(normalized.nulls.quantity, 1);
        assert_eq!(normalized.nulls.total(), 2);
        assert_eq!(normalized.records[1].city, "");
        assert_eq!(normalized.records[1].quantity, 0);
        // input untouched
        assert_eq!(table.records[1].quantity, None);
    }

    #[test]
    fn test_normalize_fails_on_bad_date() {
        let table: RawTable = vec![
            raw(Value::Int(1), Value::Str("2019-01-15".into())),
            raw(Value::Int(2), Value::Str("yesterday".into())),
        ]
        .into_iter()
        .collect();

        match normalize(&table) {
            Err(ProcessorError::TypeConversion { row, column, .. }) => {
                assert_eq!(row, 2);
                assert_eq!(column, "date");
            }
            other => panic!("expected TypeConversion, got {other:?}"),
        }
    }
}
