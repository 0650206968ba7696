//! The fixed sales report: rankings, revenue breakdowns, store and city
//! distributions, and the per-year charts.

use std::num::NonZeroUsize;
use tracing::{info, info_span};

use crate::processor::{
    AggregateOp, Column, Dimension, Measure, ProcessorError, RecordFilter, Result, SortOrder,
    normalize::NullReport, sales_table::SalesTable,
};
use crate::render::{ChartKind, ChartStyle, RenderOptions, Renderer, Series};

#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    /// Size of the top/bottom revenue rankings
    pub top_n: NonZeroUsize,
    /// Years that get a monthly breakdown; empty means every year present
    pub years: Vec<i32>,
    /// Year for the daily quantity chart; defaults to the latest year
    pub daily_year: Option<i32>,
    /// Year for the month/revenue scatter; defaults to the earliest year
    pub scatter_year: Option<i32>,
    pub style: ChartStyle,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            top_n: NonZeroUsize::new(5).unwrap_or(NonZeroUsize::MIN),
            years: Vec::new(),
            daily_year: None,
            scatter_year: None,
            style: ChartStyle::Default,
        }
    }
}

/// Runs every report section against `table`, in order. Stops at the first
/// failing section.
///
/// Returns the number of sections rendered.
pub fn run_report<R: Renderer + ?Sized>(
    table: &SalesTable,
    nulls: &NullReport,
    renderer: &mut R,
    config: &ReportConfig,
) -> Result<usize> {
    if table.is_empty() {
        return Err(ProcessorError::EmptyTable);
    }
    let _span = info_span!("report", rows = table.row_count()).entered();
    let style = config.style;
    let mut sections = 0;

    let nulls_series = Series::new(
        "missing values",
        nulls
            .columns()
            .iter()
            .map(|(c, n)| (c.name().to_string(), *n as f64))
            .collect(),
    );
    renderer.render(
        &nulls_series,
        ChartKind::Bar,
        &RenderOptions::titled("Missing values per column", style),
    )?;
    sections += 1;

    let n = config.top_n;
    renderer.render_records(
        &format!("Top {n} sales by revenue"),
        &table.top_n(Column::Revenue, n)?,
    )?;
    renderer.render_records(
        &format!("Bottom {n} sales by revenue"),
        &table.bottom_n(Column::Revenue, n)?,
    )?;
    sections += 2;

    let by_city = table.group_by(&[Dimension::City], Measure::Revenue, AggregateOp::Sum)?;
    renderer.render(
        &by_city.to_series(by_city.describe()),
        ChartKind::Bar,
        &RenderOptions::titled("Revenue by city", style).labels("City", "Revenue"),
    )?;
    sections += 1;

    let by_year = table.group_by(&[Dimension::Year], Measure::Revenue, AggregateOp::Sum)?;
    renderer.render(
        &by_year.to_series(by_year.describe()),
        ChartKind::Pie,
        &RenderOptions::titled("Revenue by year", style),
    )?;
    sections += 1;

    let years = if config.years.is_empty() {
        table.years()
    } else {
        config.years.clone()
    };
    for year in years {
        let monthly = table.filter(&RecordFilter::year(year))?.group_by(
            &[Dimension::Month],
            Measure::Revenue,
            AggregateOp::Sum,
        )?;
        renderer.render(
            &monthly.to_series(format!("{} in {year}", monthly.describe())),
            ChartKind::Bar,
            &RenderOptions::titled(format!("Revenue by month, {year}"), style)
                .labels("Month", "Revenue"),
        )?;
        sections += 1;
    }

    let monthly = table.group_by(&[Dimension::Month], Measure::Revenue, AggregateOp::Sum)?;
    renderer.render(
        &monthly.to_series(monthly.describe()),
        ChartKind::Bar,
        &RenderOptions::titled("Revenue by month", style).labels("Month", "Revenue"),
    )?;

    let quarterly = table.group_by(&[Dimension::Quarter], Measure::Revenue, AggregateOp::Sum)?;
    renderer.render(
        &quarterly.to_series(quarterly.describe()),
        ChartKind::Bar,
        &RenderOptions::titled("Revenue by quarter", style).labels("Quarter", "Revenue"),
    )?;

    let mean_monthly = table.group_by(&[Dimension::Month], Measure::Revenue, AggregateOp::Avg)?;
    renderer.render(
        &mean_monthly.to_series(mean_monthly.describe()),
        ChartKind::Line,
        &RenderOptions::titled("Mean revenue per sale by month", style)
            .labels("Month", "Mean revenue"),
    )?;
    sections += 3;

    let per_store = table.value_counts(Dimension::StoreId, SortOrder::Descending)?;
    renderer.render(
        &per_store.to_series("sales per store"),
        ChartKind::Bar,
        &RenderOptions::titled("Sales per store", style).labels("Store", "Sales"),
    )?;

    let per_city = table.value_counts(Dimension::City, SortOrder::Descending)?;
    renderer.render(
        &per_city.to_series("sales per city"),
        ChartKind::Bar,
        &RenderOptions::titled("Total sales per city", style)
            .labels("City", "Total sales")
            .color("red"),
    )?;
    sections += 2;

    let all_years = table.years();
    if let Some(year) = config.daily_year.or_else(|| all_years.last().copied()) {
        let daily = table.filter(&RecordFilter::year(year))?.group_by(
            &[Dimension::Day],
            Measure::Quantity,
            AggregateOp::Sum,
        )?;
        renderer.render(
            &daily.to_series(format!("{} in {year}", daily.describe())),
            ChartKind::Line,
            &RenderOptions::titled(format!("Products sold per day of month, {year}"), style)
                .labels("Day", "Total products sold"),
        )?;
        sections += 1;
    }

    if let Some(year) = config.scatter_year.or_else(|| all_years.first().copied()) {
        let points = table
            .filter(&RecordFilter::year(year))?
            .points(Dimension::Month, Measure::Revenue)?;
        renderer.render(
            &points,
            ChartKind::Scatter,
            &RenderOptions::titled(format!("Revenue per sale by month, {year}"), style)
                .labels("Month", "Revenue"),
        )?;
        sections += 1;
    }

    info!(sections, "report rendered");
    Ok(sections)
}
