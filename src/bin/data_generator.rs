use clap::Parser;
use rand::Rng;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

const CITIES: [&str; 5] = ["Aracaju", "Fortaleza", "Natal", "Recife", "Salvador"];

/// Writes one synthetic sales sheet per city
#[derive(Debug, Parser)]
struct Args {
    /// Output directory
    #[arg(long, default_value = "data")]
    out: PathBuf,
    /// Rows per city
    #[arg(long, default_value = "1000000")]
    rows: usize,
}

fn main() -> std::io::Result<()> {
    let args = Args::parse();
    fs::create_dir_all(&args.out)?;

    let mut rng = rand::rng();
    for (city_idx, city) in CITIES.iter().enumerate() {
        let path = args.out.join(format!("{city}.csv"));
        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "Cidade,Data,Vendas,LojaID,Qtde")?;

        // each city owns a disjoint block of store ids
        let first_store = 1000 + city_idx * 100;
        for _ in 0..args.rows {
            let store = first_store + rng.random_range(0..8);
            let year = rng.random_range(2018..=2019);
            let month = rng.random_range(1..=12);
            let day = rng.random_range(1..=28);
            let cents: u32 = rng.random_range(300..25_000);
            let qty = rng.random_range(1..=10);
            writeln!(
                writer,
                "{city},{year}-{month:02}-{day:02},{}.{:02},{store},{qty}",
                cents / 100,
                cents % 100
            )?;
        }
        writer.flush()?;
        println!("Sample CSV generated: {}", path.display());
    }

    Ok(())
}
