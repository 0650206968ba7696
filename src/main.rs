use std::io::{self, IsTerminal, Write};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use jemallocator::Jemalloc;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use sales_report::{
    AggregateOp, ChartKind, ChartStyle, Column, Dimension, JsonRenderer, Measure, NullReport,
    RecordFilter, RenderOptions, Renderer, ReportConfig, Result, SalesTable, Series, SortOrder,
    TextRenderer, load_sources, run_report,
};

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

/// Revenue report over regional sales sheets
#[derive(Debug, Parser)]
#[command(name = "sales-report", version, about)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text, global = true)]
    format: Format,

    /// Chart style: default or ggplot
    #[arg(long, default_value = "default", global = true)]
    style: ChartStyle,

    /// More logging (-v debug, -vv trace); otherwise RUST_LOG or info
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Debug, Args)]
struct Sources {
    /// CSV or Excel/ODS files
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the full report
    Report {
        #[command(flatten)]
        sources: Sources,
        /// Size of the top/bottom rankings
        #[arg(long, default_value = "5")]
        top: NonZeroUsize,
        /// Years with a monthly breakdown (default: every year present)
        #[arg(long, value_delimiter = ',')]
        years: Vec<i32>,
        /// Year of the daily quantity chart (default: latest)
        #[arg(long)]
        daily_year: Option<i32>,
        /// Year of the month/revenue scatter (default: earliest)
        #[arg(long)]
        scatter_year: Option<i32>,
    },
    /// Top or bottom records by a numeric column
    Rank {
        #[command(flatten)]
        sources: Sources,
        #[arg(long, default_value = "revenue")]
        column: Column,
        #[arg(short, default_value = "5")]
        n: NonZeroUsize,
        /// Smallest values first
        #[arg(long)]
        bottom: bool,
    },
    /// Grouped aggregation
    Group {
        #[command(flatten)]
        sources: Sources,
        /// Grouping dimensions, outermost first
        #[arg(long, value_delimiter = ',', default_value = "city")]
        by: Vec<Dimension>,
        #[arg(long, default_value = "revenue")]
        measure: Measure,
        #[arg(long, default_value = "sum")]
        op: AggregateOp,
        /// Only records from this year
        #[arg(long)]
        year: Option<i32>,
        #[arg(long, value_enum, default_value_t = Chart::Bar)]
        chart: Chart,
    },
    /// Number of sales per distinct value
    Counts {
        #[command(flatten)]
        sources: Sources,
        #[arg(long, default_value = "store_id")]
        by: Dimension,
        /// Least frequent first
        #[arg(long)]
        ascending: bool,
    },
    /// Empty cells per column
    Nulls {
        #[command(flatten)]
        sources: Sources,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Chart {
    Bar,
    Pie,
    Line,
}

impl From<Chart> for ChartKind {
    fn from(c: Chart) -> Self {
        match c {
            Chart::Bar => ChartKind::Bar,
            Chart::Pie => ChartKind::Pie,
            Chart::Line => ChartKind::Line,
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load(sources: &Sources) -> Result<(SalesTable, NullReport)> {
    let raw = load_sources(&sources.paths)?;
    debug!(rows = raw.row_count(), sources = raw.sources.len(), "raw table");
    SalesTable::from_raw(&raw)
}

fn run(cli: Cli, renderer: &mut dyn Renderer) -> Result<()> {
    let style = cli.style;
    match cli.command {
        Command::Report {
            sources,
            top,
            years,
            daily_year,
            scatter_year,
        } => {
            let (table, nulls) = load(&sources)?;
            let config = ReportConfig {
                top_n: top,
                years,
                daily_year,
                scatter_year,
                style,
            };
            run_report(&table, &nulls, renderer, &config)?;
        }
        Command::Rank {
            sources,
            column,
            n,
            bottom,
        } => {
            let (table, _) = load(&sources)?;
            let (order, label) = if bottom {
                (SortOrder::Ascending, "Bottom")
            } else {
                (SortOrder::Descending, "Top")
            };
            let ranked = table.rank(column, n, order)?;
            renderer.render_records(&format!("{label} {n} sales by {column}"), &ranked)?;
        }
        Command::Group {
            sources,
            by,
            measure,
            op,
            year,
            chart,
        } => {
            let (mut table, _) = load(&sources)?;
            if let Some(year) = year {
                table = table.filter(&RecordFilter::year(year))?;
            }
            let result = table.group_by(&by, measure, op)?;
            let title = result.describe();
            renderer.render(
                &result.to_series(title.clone()),
                chart.into(),
                &RenderOptions::titled(title, style),
            )?;
        }
        Command::Counts {
            sources,
            by,
            ascending,
        } => {
            let (table, _) = load(&sources)?;
            let order = if ascending {
                SortOrder::Ascending
            } else {
                SortOrder::Descending
            };
            let counts = table.value_counts(by, order)?;
            renderer.render(
                &counts.to_series(format!("sales per {by}")),
                ChartKind::Bar,
                &RenderOptions::titled(format!("Sales per {by}"), style).labels(by.name(), "Sales"),
            )?;
        }
        Command::Nulls { sources } => {
            let raw = load_sources(&sources.paths)?;
            let nulls = NullReport::count(&raw);
            let series = Series::new(
                "missing values",
                nulls
                    .columns()
                    .iter()
                    .map(|(c, n)| (c.name().to_string(), *n as f64))
                    .collect(),
            );
            renderer.render(
                &series,
                ChartKind::Bar,
                &RenderOptions::titled("Missing values per column", style),
            )?;
        }
    }
    Ok(())
}

/// Final flush of `out`; a failure here is an error like any other
fn finish<W: Write>(result: Result<()>, out: &mut W) -> Result<()> {
    result?;
    out.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let stdout = io::stdout();
    let ansi = stdout.is_terminal();
    let out = stdout.lock();
    let mut renderer: Box<dyn Renderer> = match cli.format {
        Format::Text => Box::new(TextRenderer::new(out).with_ansi(ansi)),
        Format::Json => Box::new(JsonRenderer::new(out)),
    };

    let result = run(cli, renderer.as_mut());
    drop(renderer);

    match finish(result, &mut io::stdout()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
