use crate::utils::sample_sources;
use sales_report::{
    FilterPredicate, FilterTarget, Measure, RecordFilter, SalesTable, Value, load_sources,
};
mod utils;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let raw = load_sources(&sample_sources()?)?;
    let (table, _) = SalesTable::from_raw(&raw)?;

    // Sales where revenue > 1000
    let big = table.filter(&RecordFilter::new(
        FilterTarget::Measure(Measure::Revenue),
        FilterPredicate::GreaterThan(Value::Float(1000.0)),
    ))?;
    println!("Sales with revenue > 1000: {}", big.row_count());

    for record in big.iter().take(10) {
        println!(
            "  {} {} {} {:.2}",
            record.store_id(),
            record.city(),
            record.date(),
            record.revenue()
        );
    }
    Ok(())
}
