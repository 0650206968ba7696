use calamine::{Data, Reader, open_workbook_auto};
use std::path::Path;
use tracing::debug;

use crate::loader::{HeaderMap, RawField};
use crate::processor::{ProcessorError, Result, Value, raw::RawRecord};

/// Reads the first worksheet of an Excel/ODS workbook.
///
/// Date cells arrive as spreadsheet serial numbers ([`Value::Float`]), which
/// the normalizer decodes.
pub fn load_spreadsheet(path: &Path) -> Result<Vec<RawRecord>> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook.worksheet_range_at(0).ok_or_else(|| {
        ProcessorError::Parse(format!("{}: workbook has no worksheets", path.display()))
    })??;

    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .ok_or_else(|| ProcessorError::Parse(format!("{}: missing header row", path.display())))?
        .iter()
        .map(|c| c.to_string())
        .collect();
    let header_map = HeaderMap::resolve(&header)?;
    debug!(source = %path.display(), ?header, "resolved worksheet header");

    rows.enumerate()
        .filter(|(_, row)| row.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|(i, row)| -> Result<RawRecord> {
            // header is row 1
            let line = i + 2;
            let cell = |field: RawField| row.get(header_map.position(field)).unwrap_or(&Data::Empty);
            let bad = |field: RawField, reason: &str| {
                ProcessorError::Parse(format!(
                    "{}:{line}: column {}: '{}': {reason}",
                    path.display(),
                    field.name(),
                    cell(field)
                ))
            };

            if let Some(field) = RawField::ALL
                .into_iter()
                .find(|f| matches!(cell(*f), Data::Error(_)))
            {
                return Err(bad(field, "error cell"));
            }

            Ok(RawRecord {
                store_id: dynamic_cell(cell(RawField::StoreId)),
                city: dynamic_cell(cell(RawField::City)).map(|v| v.to_string()),
                date: dynamic_cell(cell(RawField::Date)),
                unit_price: float_cell(cell(RawField::UnitPrice))
                    .ok_or_else(|| bad(RawField::UnitPrice, "not a number"))?,
                quantity: count_cell(cell(RawField::Quantity))
                    .ok_or_else(|| bad(RawField::Quantity, "not an integer in 0..=i64::MAX"))?,
            })
        })
        .collect()
}

fn dynamic_cell(cell: &Data) -> Option<Value> {
    match cell {
        Data::Int(v) => Some(Value::Int(*v)),
        Data::Float(v) => Some(Value::Float(*v)),
        Data::DateTime(dt) => Some(Value::Float(dt.as_f64())),
        Data::String(s) if s.trim().is_empty() => None,
        Data::String(s) | Data::DateTimeIso(s) => Some(Value::Str(s.trim().to_string())),
        Data::DurationIso(s) => Some(Value::Str(s.trim().to_string())),
        Data::Bool(b) => Some(Value::Str(b.to_string())),
        // error cells are rejected per row before this is reached
        _ => None,
    }
}

/// `None` = malformed, `Some(None)` = empty
fn float_cell(cell: &Data) -> Option<Option<f64>> {
    match dynamic_cell(cell) {
        None => Some(None),
        Some(Value::Int(v)) => Some(Some(v as f64)),
        Some(Value::Float(v)) => Some(Some(v)),
        Some(Value::Str(s)) => s.parse::<f64>().ok().filter(|v| v.is_finite()).map(Some),
    }
}

fn count_cell(cell: &Data) -> Option<Option<u64>> {
    match dynamic_cell(cell) {
        None => Some(None),
        Some(Value::Int(v)) => u64::try_from(v).ok().map(Some),
        Some(Value::Float(v)) if v >= 0.0 && v.fract() == 0.0 && v < i64::MAX as f64 => {
            Some(Some(v as u64))
        }
        Some(Value::Float(_)) => None,
        Some(Value::Str(s)) => s
            .parse::<i64>()
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cells_map_to_raw_values() {
        assert_eq!(dynamic_cell(&Data::Int(1520)), Some(Value::Int(1520)));
        assert_eq!(dynamic_cell(&Data::String("  ".into())), None);
        assert_eq!(dynamic_cell(&Data::Empty), None);
        assert_eq!(float_cell(&Data::String("12.5".into())), Some(Some(12.5)));
        assert_eq!(float_cell(&Data::String("n/a".into())), None);
        assert_eq!(count_cell(&Data::Float(4.0)), Some(Some(4)));
        assert_eq!(count_cell(&Data::Int(-1)), None);
        assert_eq!(count_cell(&Data::Empty), Some(None));
    }
}
