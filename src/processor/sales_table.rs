use chrono::Datelike;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use std::collections::BTreeSet;
use std::num::NonZeroUsize;

use crate::{
    helpers::simd_helpers::{aggregate_f64, aggregate_i64, filter_f64, filter_i64},
    processor::{
        AggregateOp, AggregateResult, Column, Dimension, FilterPredicate, FilterTarget, Measure,
        ProcessorError, RecordFilter, Result, SortOrder, Value,
        aggregation::{AggregationResult, group_records},
        normalize::{NormalizedTable, NullReport, normalize},
        raw::RawTable,
        record::{EnrichedRecord, SalesRecord},
    },
    render::Series,
};

/// Enriched, immutable sales table
///
/// # Examples
///
/// ```rust
/// # use sales_report::{SalesTable, SalesRecord, StoreId, Dimension, Measure, AggregateOp};
/// # use chrono::NaiveDate;
/// let table = SalesTable::from_records(vec![SalesRecord {
///     store_id: StoreId::new("1520"),
///     city: "Natal".into(),
///     date: NaiveDate::from_ymd_opt(2019, 1, 15).unwrap(),
///     unit_price: 10.0,
///     quantity: 2,
/// }]);
/// let by_city = table
///     .group_by(&[Dimension::City], Measure::Revenue, AggregateOp::Sum)
///     .unwrap();
/// println!("{}", by_city.describe());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SalesTable {
    records: Vec<EnrichedRecord>,
}

impl SalesTable {
    /// Attaches `revenue` and `quarter` to every normalized record.
    ///
    /// Runs data-parallel; output order equals input order.
    pub fn derive(normalized: NormalizedTable) -> Self {
        Self::from_records(normalized.records)
    }

    pub fn from_records(records: Vec<SalesRecord>) -> Self {
        let records = records
            .into_par_iter()
            .map(EnrichedRecord::derive)
            .collect();
        SalesTable { records }
    }

    /// Normalize + derive in one go
    pub fn from_raw(raw: &RawTable) -> Result<(Self, NullReport)> {
        let normalized = normalize(raw)?;
        let nulls = normalized.nulls;
        Ok((Self::derive(normalized), nulls))
    }

    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[EnrichedRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnrichedRecord> + '_ {
        self.records.iter()
    }

    /// Distinct calendar years, ascending
    pub fn years(&self) -> Vec<i32> {
        self.records
            .iter()
            .map(|r| r.date().year())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn ensure_not_empty(&self) -> Result<()> {
        if self.records.is_empty() {
            Err(ProcessorError::EmptyTable)
        } else {
            Ok(())
        }
    }

    pub fn column_f64(&self, measure: Measure) -> Vec<f64> {
        self.records.iter().map(|r| r.measure(measure)).collect()
    }

    /// Exact integer column.
    ///
    /// # Errors
    /// [`ProcessorError::InvalidColumn`] for a fractional measure,
    /// [`ProcessorError::Overflow`] for a value beyond `i64::MAX`
    pub fn column_i64(&self, measure: Measure) -> Result<Vec<i64>> {
        self.records
            .iter()
            .map(|r| r.checked_i64(measure))
            .collect()
    }

    /// The `n` records with the most extreme `column` values.
    ///
    /// Returns all records when `n` exceeds the table size. Ties keep table
    /// order.
    ///
    /// # Errors
    /// - [`ProcessorError::InvalidColumn`] if `column` is not numeric
    /// - [`ProcessorError::EmptyTable`] on a zero-record table
    pub fn rank(
        &self,
        column: Column,
        n: NonZeroUsize,
        order: SortOrder,
    ) -> Result<Vec<&EnrichedRecord>> {
        let measure = column.measure()?;
        self.ensure_not_empty()?;

        let mut ranked: Vec<&EnrichedRecord> = self.records.iter().collect();
        // stable: equal values keep their original relative order
        ranked.sort_by(|a, b| match order {
            SortOrder::Descending => b.measure(measure).total_cmp(&a.measure(measure)),
            SortOrder::Ascending => a.measure(measure).total_cmp(&b.measure(measure)),
        });
        ranked.truncate(n.get());
        Ok(ranked)
    }

    pub fn top_n(&self, column: Column, n: NonZeroUsize) -> Result<Vec<&EnrichedRecord>> {
        self.rank(column, n, SortOrder::Descending)
    }

    pub fn bottom_n(&self, column: Column, n: NonZeroUsize) -> Result<Vec<&EnrichedRecord>> {
        self.rank(column, n, SortOrder::Ascending)
    }

    /// Grouped aggregation over one or more dimensions
    ///
    /// # Arguments
    /// * `dimensions` - Grouping keys, outermost first
    /// * `measure` - Numeric column to reduce
    /// * `op` - Reduction applied per group
    ///
    /// # Returns
    /// [`AggregationResult`] ordered by key ascending
    pub fn group_by(
        &self,
        dimensions: &[Dimension],
        measure: Measure,
        op: AggregateOp,
    ) -> Result<AggregationResult> {
        self.ensure_not_empty()?;
        group_records(&self.records, dimensions, Some(measure), op)
    }

    pub(crate) fn group_rows(
        &self,
        rows: &[usize],
        dimensions: &[Dimension],
        measure: Option<Measure>,
        op: AggregateOp,
    ) -> Result<AggregationResult> {
        group_records(rows.iter().map(|&i| &self.records[i]), dimensions, measure, op)
    }

    /// Occurrences of each distinct `dimension` value, ordered by count
    pub fn value_counts(&self, dimension: Dimension, order: SortOrder) -> Result<AggregationResult> {
        self.ensure_not_empty()?;
        Ok(group_records(&self.records, &[dimension], None, AggregateOp::Count)?.ranked(order))
    }

    /// Whole-column reduction
    pub fn aggregate(&self, measure: Measure, op: AggregateOp) -> Result<AggregateResult> {
        self.ensure_not_empty()?;
        aggregate_column(self.records.iter(), measure, op)
    }

    pub(crate) fn aggregate_rows(
        &self,
        rows: &[usize],
        measure: Measure,
        op: AggregateOp,
    ) -> Result<AggregateResult> {
        if rows.is_empty() {
            return Err(ProcessorError::EmptyTable);
        }
        aggregate_column(rows.iter().map(|&i| &self.records[i]), measure, op)
    }

    /// Indices of the records matching `filter`, ascending
    pub fn filter_indices(&self, filter: &RecordFilter) -> Result<Vec<usize>> {
        let predicate = &filter.predicate;
        match filter.target {
            FilterTarget::Measure(m) => {
                if !predicate.is_numeric() {
                    return Err(ProcessorError::InvalidQuery(format!(
                        "{m} can only be compared with numbers"
                    )));
                }
                if let Ok(ints) = self.column_i64(m) {
                    Ok(filter_i64(&ints, predicate))
                } else {
                    Ok(filter_f64(&self.column_f64(m), predicate))
                }
            }
            FilterTarget::Dimension(d) => {
                let label = matches!(d, Dimension::City | Dimension::StoreId);
                let compatible = match predicate {
                    FilterPredicate::Equals(v)
                    | FilterPredicate::GreaterThan(v)
                    | FilterPredicate::LessThan(v) => matches!(v, Value::Str(_)) == label,
                    FilterPredicate::Between(lo, hi) => {
                        matches!(lo, Value::Str(_)) == label && matches!(hi, Value::Str(_)) == label
                    }
                };
                if !compatible {
                    return Err(ProcessorError::InvalidQuery(format!(
                        "predicate type does not match dimension {d}"
                    )));
                }
                Ok(self
                    .records
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| predicate.matches(&r.dimension_value(d)))
                    .map(|(i, _)| i)
                    .collect())
            }
        }
    }

    /// Sub-table of the matching records, original order kept
    pub fn filter(&self, filter: &RecordFilter) -> Result<SalesTable> {
        let rows = self.filter_indices(filter)?;
        Ok(self.select(&rows))
    }

    pub fn select(&self, rows: &[usize]) -> SalesTable {
        SalesTable {
            records: rows.iter().map(|&i| self.records[i].clone()).collect(),
        }
    }

    /// One `(x, y)` point per record, e.g. month vs revenue for a scatter plot
    pub fn points(&self, x: Dimension, y: Measure) -> Result<Series> {
        self.ensure_not_empty()?;
        Ok(Series::new(
            format!("{y} by {x}"),
            self.records
                .iter()
                .map(|r| (r.key_part(x).to_string(), r.measure(y)))
                .collect(),
        ))
    }
}

fn aggregate_column<'a, I>(records: I, measure: Measure, op: AggregateOp) -> Result<AggregateResult>
where
    I: Iterator<Item = &'a EnrichedRecord>,
{
    if op == AggregateOp::Count {
        return Ok(AggregateResult::Int(records.count() as i64));
    }

    if measure.is_integer() {
        let values = records
            .map(|r| r.checked_i64(measure))
            .collect::<Result<Vec<i64>>>()?;
        if op == AggregateOp::Avg {
            let sum: i128 = values.iter().map(|&v| v as i128).sum();
            return Ok(AggregateResult::Float(sum as f64 / values.len() as f64));
        }
        let v = aggregate_i64(&values, op).ok_or_else(|| {
            ProcessorError::Overflow(format!("{op} of {measure} exceeds {}", i64::MAX))
        })?;
        Ok(AggregateResult::Int(v))
    } else {
        let values: Vec<f64> = records.map(|r| r.measure(measure)).collect();
        Ok(AggregateResult::Float(aggregate_f64(&values, op)))
    }
}
