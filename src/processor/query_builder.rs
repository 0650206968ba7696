use lru::LruCache;
use tracing::trace;

use crate::processor::aggregation::AggregationResult;
use crate::processor::record::EnrichedRecord;
use crate::processor::sales_table::SalesTable;
use crate::processor::{
    AggregateOp, AggregateResult, Column, Dimension, FilterPredicate, FilterTarget, Measure,
    ProcessorError, RecordFilter, Result, SortOrder,
};
use std::cell::RefCell;

/// Everything that determines a query's result
#[derive(Debug, Hash, Eq, PartialEq, Clone)]
pub struct QueryKey {
    filters: Vec<RecordFilter>,
    group_by: Vec<Dimension>,
    aggregation: Option<(Measure, AggregateOp)>,
    order: Option<(Option<Measure>, SortOrder)>,
    limit: Option<usize>,
}

use std::num::NonZeroUsize;
use std::rc::Rc;

const CACHE_CAPACITY: usize = 128;

/// LRU of query results. Only valid for the table it was used with; tables
/// never change after enrichment so entries never go stale.
#[derive(Debug)]
pub struct QueryCache {
    cache: RefCell<LruCache<QueryKey, QueryResult>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::with_capacity(NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            cache: RefCell::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, key: &QueryKey) -> Option<QueryResult> {
        self.cache.borrow_mut().get(key).cloned()
    }

    pub fn put(&self, key: QueryKey, value: QueryResult) {
        self.cache.borrow_mut().put(key, value);
    }

    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Query results
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Whole-table reduction
    Aggregate(AggregateResult),
    /// Grouped reduction or value counts
    Grouped(AggregationResult),
    /// Ranked records
    Records(Vec<EnrichedRecord>),
}

/// Query builder over an immutable [`SalesTable`]
///
/// ```rust
/// # use std::rc::Rc;
/// # use sales_report::{SalesTable, Dimension, Measure, AggregateOp, RecordFilter};
/// let table = Rc::new(SalesTable::default());
/// let query = table
///     .query()
///     .filter(RecordFilter::year(2019))
///     .group_by(Dimension::Month)
///     .aggregate(Measure::Revenue, AggregateOp::Sum);
/// assert!(query.execute().is_err()); // empty table
/// ```
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    table: Rc<SalesTable>,
    cache: Option<Rc<QueryCache>>,
    key: QueryKey,
}

impl QueryBuilder {
    pub fn new(table: Rc<SalesTable>, cache: Option<Rc<QueryCache>>) -> Self {
        Self {
            table,
            cache,
            key: QueryKey {
                filters: Vec::new(),
                group_by: Vec::new(),
                aggregation: None,
                order: None,
                limit: None,
            },
        }
    }

    /// Add a filter condition
    pub fn filter(mut self, filter: RecordFilter) -> Self {
        self.key.filters.push(filter);
        self
    }

    pub fn filter_on(self, target: FilterTarget, predicate: FilterPredicate) -> Self {
        self.filter(RecordFilter::new(target, predicate))
    }

    /// Add a group-by dimension; repeat for composite keys
    pub fn group_by(mut self, dimension: Dimension) -> Self {
        self.key.group_by.push(dimension);
        self
    }

    pub fn group_by_multi(mut self, dimensions: &[Dimension]) -> Self {
        self.key.group_by.extend_from_slice(dimensions);
        self
    }

    pub fn aggregate(mut self, measure: Measure, op: AggregateOp) -> Self {
        self.key.aggregation = Some((measure, op));
        self
    }

    /// Rank groups by their value
    pub fn order(mut self, order: SortOrder) -> Self {
        self.key.order = Some((None, order));
        self
    }

    /// Rank records by a column; only valid without group-by or aggregation
    pub fn order_by(mut self, column: Column, order: SortOrder) -> Result<Self> {
        self.key.order = Some((Some(column.measure()?), order));
        Ok(self)
    }

    /// Limit number of results
    pub fn limit(mut self, n: usize) -> Self {
        self.key.limit = Some(n);
        self
    }

    /// Disable caching
    pub fn no_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn execute(self) -> Result<QueryResult> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&self.key) {
                trace!(key = ?self.key, "query cache hit");
                return Ok(hit);
            }
        }

        let result = self.run()?;

        if let Some(cache) = &self.cache {
            cache.put(self.key.clone(), result.clone());
        }
        Ok(result)
    }

    fn run(&self) -> Result<QueryResult> {
        let rows = self.apply_filters()?;
        let key = &self.key;

        match (key.group_by.is_empty(), key.aggregation, key.order) {
            // whole-table reduction
            (true, Some((measure, op)), None) => Ok(QueryResult::Aggregate(
                self.table.aggregate_rows(&rows, measure, op)?,
            )),

            // grouped reduction, optionally ranked by group value
            (false, aggregation, None | Some((None, _))) => {
                let (measure, op) = match aggregation {
                    Some((m, op)) => (Some(m), op),
                    None => (None, AggregateOp::Count),
                };
                let mut result = self.table.group_rows(&rows, &key.group_by, measure, op)?;
                if let Some((_, order)) = key.order {
                    result = result.ranked(order);
                }
                if let Some(n) = key.limit {
                    result = result.top(n);
                }
                Ok(QueryResult::Grouped(result))
            }

            // record ranking
            (true, None, Some((Some(measure), order))) => {
                if rows.is_empty() {
                    return Err(ProcessorError::EmptyTable);
                }
                let mut ranked: Vec<&EnrichedRecord> =
                    rows.iter().map(|&i| &self.table.records()[i]).collect();
                ranked.sort_by(|a, b| match order {
                    SortOrder::Descending => b.measure(measure).total_cmp(&a.measure(measure)),
                    SortOrder::Ascending => a.measure(measure).total_cmp(&b.measure(measure)),
                });
                if let Some(n) = key.limit {
                    ranked.truncate(n);
                }
                Ok(QueryResult::Records(ranked.into_iter().cloned().collect()))
            }

            _ => Err(ProcessorError::InvalidQuery(
                "unsupported combination of group-by, aggregate and order".into(),
            )),
        }
    }

    /// Row indices surviving every filter
    fn apply_filters(&self) -> Result<Vec<usize>> {
        let mut filtered_rows: Option<Vec<usize>> = None;

        for filter in &self.key.filters {
            let current = self.table.filter_indices(filter)?;
            filtered_rows = Some(match filtered_rows {
                None => current,
                Some(existing) => intersect_sorted_vecs(existing, current),
            });
        }

        Ok(filtered_rows.unwrap_or_else(|| (0..self.table.row_count()).collect()))
    }
}

/// Intersects two ascending index lists
fn intersect_sorted_vecs(a: Vec<usize>, b: Vec<usize>) -> Vec<usize> {
    let mut result = Vec::with_capacity(a.len().min(b.len()));
    let mut i = 0;
    let mut j = 0;

    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Equal => {
                result.push(a[i]);
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }

    result
}

impl SalesTable {
    pub fn query(self: &Rc<Self>) -> QueryBuilder {
        QueryBuilder::new(self.clone(), None)
    }

    pub fn query_with_cache(self: &Rc<Self>, cache: &Rc<QueryCache>) -> QueryBuilder {
        QueryBuilder::new(self.clone(), Some(cache.clone()))
    }
}
