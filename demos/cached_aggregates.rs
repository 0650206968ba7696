use std::rc::Rc;
use std::time::Instant;

use crate::utils::sample_sources;
use sales_report::{
    AggregateOp, Dimension, Measure, QueryCache, RecordFilter, SalesTable, SortOrder,
    load_sources,
};
mod utils;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let raw = load_sources(&sample_sources()?)?;
    let (table, _) = SalesTable::from_raw(&raw)?;
    let table = Rc::new(table);
    let cache = Rc::new(QueryCache::new());

    let best_months = || {
        table
            .query_with_cache(&cache)
            .filter(RecordFilter::year(2019))
            .group_by(Dimension::Month)
            .aggregate(Measure::Revenue, AggregateOp::Sum)
            .order(SortOrder::Descending)
            .limit(3)
            .execute()
    };

    // First run (filter + group-by)
    let start = Instant::now();
    let result = best_months()?;
    println!(
        "First run: {:?}, elapsed: {:?}",
        result,
        start.elapsed()
    );

    // Second run (should be cached)
    let start = Instant::now();
    let cached_result = best_months()?;
    println!(
        "Cached run: {:?}, elapsed: {:?}",
        cached_result,
        start.elapsed()
    );

    Ok(())
}
