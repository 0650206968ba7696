use crate::utils::sample_sources;
use sales_report::{AggregateOp, Dimension, Measure, SalesTable, SortOrder, load_sources};
mod utils;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let raw = load_sources(&sample_sources()?)?;
    let (table, _) = SalesTable::from_raw(&raw)?;

    // Revenue per city, biggest first
    let by_city = table
        .group_by(&[Dimension::City], Measure::Revenue, AggregateOp::Sum)?
        .ranked(SortOrder::Descending);
    for (city, revenue) in &by_city.entries {
        println!("City {} => {}", city, revenue);
    }

    // Mean revenue per (year, quarter)
    let quarterly = table.group_by(
        &[Dimension::Year, Dimension::Quarter],
        Measure::Revenue,
        AggregateOp::Avg,
    )?;
    println!("{}", quarterly.describe());
    for (key, mean) in &quarterly.entries {
        println!("  {} => {}", key, mean);
    }

    Ok(())
}
