use sales_report::{AggregateOp, Measure, SalesTable, load_sources};

use crate::utils::sample_sources;
mod utils;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let raw = load_sources(&sample_sources()?)?;
    let (table, nulls) = SalesTable::from_raw(&raw)?;
    println!("{} rows, {} empty cells", table.row_count(), nulls.total());

    let total = table.aggregate(Measure::Revenue, AggregateOp::Sum)?;
    println!("Total revenue: {}", total);

    let mean = table.aggregate(Measure::Revenue, AggregateOp::Avg)?;
    println!("Mean revenue per sale: {}", mean);

    let items = table.aggregate(Measure::Quantity, AggregateOp::Sum)?;
    println!("Items sold: {}", items);

    Ok(())
}
