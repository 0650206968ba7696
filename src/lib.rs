//! # sales_report
//!
//! `sales_report` turns regional sales sheets into a revenue report. It
//! supports:
//!
//! - Memory-mapped CSV loading, chunked and parsed in parallel with Rayon
//! - Excel/ODS workbooks behind the `spreadsheet` feature
//! - Null diagnostics and normalization into typed sales records
//! - Derived `revenue` and `quarter` columns
//! - Top/bottom-N rankings with stable tie ordering
//! - Grouped aggregation by city, store, year, month, quarter or day
//! - SIMD-accelerated whole-column aggregation and filtering
//! - Cached queries through the [`QueryBuilder`]
//!
//! Results leave the pipeline as ordered series, handed to a [`Renderer`]
//! (plain text or JSON lines).
//!
//! # Example
//!
//! ```rust
//! use sales_report::{AggregateOp, Dimension, Measure, RecordFilter, SalesRecord, SalesTable, StoreId};
//! use chrono::NaiveDate;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sale = |store: &str, city: &str, y, m, d, price, qty| SalesRecord {
//!         store_id: StoreId::new(store),
//!         city: city.to_string(),
//!         date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
//!         unit_price: price,
//!         quantity: qty,
//!     };
//!     let table = SalesTable::from_records(vec![
//!         sale("1", "A", 2018, 1, 1, 10.0, 2),
//!         sale("2", "B", 2019, 1, 1, 5.0, 1),
//!         sale("3", "A", 2019, 2, 1, 20.0, 1),
//!     ]);
//!
//!     // Revenue per city
//!     let by_city = table.group_by(&[Dimension::City], Measure::Revenue, AggregateOp::Sum)?;
//!     for (city, revenue) in &by_city.entries {
//!         println!("{city} => {revenue}");
//!     }
//!
//!     // Monthly revenue for one year
//!     let monthly = table
//!         .filter(&RecordFilter::year(2019))?
//!         .group_by(&[Dimension::Month], Measure::Revenue, AggregateOp::Sum)?;
//!     assert_eq!(monthly.len(), 2);
//!
//!     Ok(())
//! }
//! ```

mod helpers;
pub mod loader;
pub mod processor;
pub mod render;
pub mod report;

pub use loader::load_sources;
pub use processor::{
    AggregateOp, AggregateResult, Column, Dimension, FilterPredicate, FilterTarget, Measure,
    ProcessorError, RecordFilter, Result, SortOrder, Value,
    aggregation::{AggregationResult, GroupKey},
    normalize::{NullReport, normalize},
    query_builder::{QueryBuilder, QueryCache, QueryResult},
    raw::{RawRecord, RawTable},
    record::{EnrichedRecord, KeyPart, SalesRecord, StoreId},
    sales_table::SalesTable,
};
pub use render::{ChartKind, ChartStyle, JsonRenderer, RenderOptions, Renderer, Series, TextRenderer};
pub use report::{ReportConfig, run_report};
