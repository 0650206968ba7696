use std::io::Write;
use tracing::warn;

use crate::processor::{Result, record::EnrichedRecord};
use crate::render::{ChartKind, ChartStyle, RenderOptions, Renderer, Series};

const DEFAULT_WIDTH: usize = 40;

/// Terminal charts and tables
#[derive(Debug)]
pub struct TextRenderer<W: Write> {
    out: W,
    width: usize,
    ansi: bool,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        TextRenderer {
            out,
            width: DEFAULT_WIDTH,
            ansi: false,
        }
    }

    /// Width of the longest bar, in characters
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(1);
        self
    }

    /// Honour `RenderOptions::color` with ANSI escapes
    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn scaled(&self, value: f64, max: f64) -> usize {
        if max <= 0.0 || !value.is_finite() {
            return 0;
        }
        ((value.max(0.0) / max) * self.width as f64).round() as usize
    }

    fn paint(&self, text: String, options: &RenderOptions) -> String {
        let Some(color) = options.color.as_deref().filter(|_| self.ansi) else {
            return text;
        };
        let code = match color.to_ascii_lowercase().as_str() {
            "red" => 31,
            "green" => 32,
            "yellow" => 33,
            "blue" => 34,
            "magenta" => 35,
            "cyan" => 36,
            other => {
                warn!(color = other, "unsupported terminal color");
                return text;
            }
        };
        format!("\x1b[{code}m{text}\x1b[0m")
    }

    fn header(&mut self, series: &Series, options: &RenderOptions) -> Result<()> {
        let title = options.title.as_deref().unwrap_or(&series.name);
        writeln!(self.out, "{title}")?;
        let rule = match options.style {
            ChartStyle::Default => "-",
            ChartStyle::Ggplot => "=",
        };
        writeln!(self.out, "{}", rule.repeat(title.chars().count()))?;
        if let (Some(x), Some(y)) = (&options.x_label, &options.y_label) {
            writeln!(self.out, "{x} → {y}")?;
        }
        Ok(())
    }
}

fn glyph(style: ChartStyle) -> char {
    match style {
        ChartStyle::Default => '#',
        ChartStyle::Ggplot => '█',
    }
}

fn label_width(series: &Series) -> usize {
    series
        .points
        .iter()
        .map(|(k, _)| k.chars().count())
        .max()
        .unwrap_or(0)
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn render(&mut self, series: &Series, kind: ChartKind, options: &RenderOptions) -> Result<()> {
        self.header(series, options)?;
        let lw = label_width(series);
        let g = glyph(options.style);

        match kind {
            ChartKind::Bar => {
                let max = series.max();
                for (k, v) in &series.points {
                    let bar = self.paint(g.to_string().repeat(self.scaled(*v, max)), options);
                    writeln!(self.out, "{k:>lw$} | {bar} {v:.2}")?;
                }
            }
            ChartKind::Line => {
                let max = series.max();
                for (k, v) in &series.points {
                    let pos = self.scaled(*v, max);
                    let marker = self.paint("o".to_string(), options);
                    writeln!(self.out, "{k:>lw$} | {}{marker} {v:.2}", " ".repeat(pos))?;
                }
            }
            ChartKind::Pie => {
                let total = series.total();
                for (k, v) in &series.points {
                    let share = if total > 0.0 { v / total } else { 0.0 };
                    let slice = self.paint(g.to_string().repeat(self.scaled(share, 1.0)), options);
                    writeln!(self.out, "{k:>lw$} | {slice} {:.1}%", share * 100.0)?;
                }
            }
            ChartKind::Scatter => {
                // one row per distinct x, every y plotted on it
                let (min, max) = (series.min().min(0.0), series.max());
                let span = max - min;
                let mut rows: Vec<(&str, Vec<char>)> = Vec::new();
                for (k, v) in &series.points {
                    let idx = match rows.iter().position(|(x, _)| *x == k.as_str()) {
                        Some(i) => i,
                        None => {
                            rows.push((k.as_str(), vec![' '; self.width + 1]));
                            rows.len() - 1
                        }
                    };
                    let pos = self.scaled(v - min, span).min(self.width);
                    rows[idx].1[pos] = '*';
                }
                for (k, cells) in rows {
                    let line = self.paint(cells.into_iter().collect::<String>(), options);
                    writeln!(self.out, "{k:>lw$} |{}", line.trim_end())?;
                }
                writeln!(self.out, "{:>lw$} +{min:.2} .. {max:.2}", "")?;
            }
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn render_records(&mut self, title: &str, records: &[&EnrichedRecord]) -> Result<()> {
        writeln!(self.out, "{title}")?;
        writeln!(
            self.out,
            "{:<10} {:<14} {:<10} {:>10} {:>8} {:>12}",
            "store_id", "city", "date", "unit_price", "quantity", "revenue"
        )?;
        for r in records {
            writeln!(
                self.out,
                "{:<10} {:<14} {:<10} {:>10.2} {:>8} {:>12.2}",
                r.store_id().as_str(),
                r.city(),
                r.date(),
                r.unit_price(),
                r.quantity(),
                r.revenue()
            )?;
        }
        writeln!(self.out)?;
        Ok(())
    }
}
