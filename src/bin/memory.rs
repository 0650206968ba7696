use std::io;
use std::path::PathBuf;

use sales_report::{ReportConfig, SalesTable, TextRenderer, load_sources, run_report};

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

fn main() -> sales_report::Result<()> {
    let _profiler = dhat::Profiler::new_heap();

    let paths: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        eprintln!("usage: memory <sales.csv>...");
        return Ok(());
    }

    let raw = load_sources(&paths)?;
    let (table, nulls) = SalesTable::from_raw(&raw)?;
    drop(raw);

    let mut renderer = TextRenderer::new(io::sink());
    run_report(&table, &nulls, &mut renderer, &ReportConfig::default())?;

    println!("Memory benchmark finished. See dhat-heap.json for details");
    Ok(())
}
