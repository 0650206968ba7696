//! Source loading: every file must expose the same five columns, matched by
//! header name in any order. Rows from all sources are concatenated.

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use std::path::Path;
use tracing::info;

use crate::processor::{
    ProcessorError, Result,
    raw::{RawRecord, RawTable},
};

pub mod csv_source;
#[cfg(feature = "spreadsheet")]
pub mod spreadsheet;

/// The five source columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawField {
    StoreId,
    City,
    Date,
    UnitPrice,
    Quantity,
}

impl RawField {
    pub const ALL: [RawField; 5] = [
        RawField::StoreId,
        RawField::City,
        RawField::Date,
        RawField::UnitPrice,
        RawField::Quantity,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RawField::StoreId => "store_id",
            RawField::City => "city",
            RawField::Date => "date",
            RawField::UnitPrice => "unit_price",
            RawField::Quantity => "quantity",
        }
    }

    // Portuguese names are the headers of the regional spreadsheets.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            RawField::StoreId => &["store_id", "storeid", "store", "lojaid", "loja_id", "loja"],
            RawField::City => &["city", "cidade"],
            RawField::Date => &["date", "data"],
            RawField::UnitPrice => &["unit_price", "price", "vendas"],
            RawField::Quantity => &["quantity", "qty", "qtde"],
        }
    }

    fn matches(self, header: &str) -> bool {
        let h = header
            .trim()
            .trim_start_matches('\u{feff}')
            .trim_matches('"')
            .to_ascii_lowercase();
        self.aliases().contains(&h.as_str())
    }
}

/// Column positions of the five fields within a source's header row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderMap {
    positions: [usize; 5],
    width: usize,
}

impl HeaderMap {
    pub fn resolve<S: AsRef<str>>(headers: &[S]) -> Result<Self> {
        let mut positions = [0usize; 5];
        for (slot, field) in positions.iter_mut().zip(RawField::ALL) {
            *slot = headers
                .iter()
                .position(|h| field.matches(h.as_ref()))
                .ok_or_else(|| ProcessorError::MissingColumn(field.name().to_string()))?;
        }
        Ok(HeaderMap {
            positions,
            width: headers.len(),
        })
    }

    pub fn position(&self, field: RawField) -> usize {
        self.positions[field as usize]
    }

    /// Number of columns in the source
    pub fn width(&self) -> usize {
        self.width
    }
}

/// Supported source formats, by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Csv,
    Spreadsheet,
}

impl SourceKind {
    pub fn detect(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(SourceKind::Csv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" if cfg!(feature = "spreadsheet") => {
                Ok(SourceKind::Spreadsheet)
            }
            _ => Err(ProcessorError::UnsupportedSource(path.display().to_string())),
        }
    }
}

/// Loads one source
pub fn load_source(path: &Path) -> Result<Vec<RawRecord>> {
    match SourceKind::detect(path)? {
        SourceKind::Csv => csv_source::load_csv(path),
        #[cfg(feature = "spreadsheet")]
        SourceKind::Spreadsheet => spreadsheet::load_spreadsheet(path),
        #[cfg(not(feature = "spreadsheet"))]
        SourceKind::Spreadsheet => Err(ProcessorError::UnsupportedSource(
            path.display().to_string(),
        )),
    }
}

/// Loads every source (in parallel) and concatenates them in argument order
pub fn load_sources<P: AsRef<Path> + Sync>(paths: &[P]) -> Result<RawTable> {
    let loaded = paths
        .par_iter()
        .map(|p| {
            let path = p.as_ref();
            load_source(path).map(|rows| (path.display().to_string(), rows))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut table = RawTable::new();
    for (name, rows) in loaded {
        info!(source = %name, rows = rows.len(), "loaded source");
        table.append(name, rows);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_aliases_any_order() {
        let map = HeaderMap::resolve(&["Qtde", "Cidade", "Data", "Vendas", "LojaID"]).unwrap();
        assert_eq!(map.position(RawField::StoreId), 4);
        assert_eq!(map.position(RawField::City), 1);
        assert_eq!(map.position(RawField::Quantity), 0);
        assert_eq!(map.width(), 5);
    }

    #[test]
    fn test_missing_header() {
        let err = HeaderMap::resolve(&["store_id", "city", "date", "unit_price"]).unwrap_err();
        assert!(matches!(err, ProcessorError::MissingColumn(c) if c == "quantity"));
    }

    #[test]
    fn test_source_kind_by_extension() {
        assert_eq!(
            SourceKind::detect(Path::new("data/Natal.CSV")).unwrap(),
            SourceKind::Csv
        );
        assert!(matches!(
            SourceKind::detect(Path::new("notes.txt")),
            Err(ProcessorError::UnsupportedSource(_))
        ));
    }

    #[cfg(feature = "spreadsheet")]
    #[test]
    fn test_workbook_extensions() {
        for name in ["Aracaju.xlsx", "Natal.XLS", "Recife.xlsb", "Salvador.ods"] {
            assert_eq!(
                SourceKind::detect(Path::new(name)).unwrap(),
                SourceKind::Spreadsheet,
                "{name}"
            );
        }
    }

    #[cfg(not(feature = "spreadsheet"))]
    #[test]
    fn test_workbook_needs_feature() {
        assert!(matches!(
            SourceKind::detect(Path::new("Aracaju.xlsx")),
            Err(ProcessorError::UnsupportedSource(_))
        ));
    }
}
