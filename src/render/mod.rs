//! Hand-off point between the aggregation pipeline and whatever draws the
//! results. The pipeline only ever produces ordered `(key, value)` series.

use serde::Serialize;
use std::str::FromStr;

use crate::processor::{ProcessorError, Result, record::EnrichedRecord};

pub mod json;
pub mod text;

pub use json::JsonRenderer;
pub use text::TextRenderer;

/// Ordered key → value series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub points: Vec<(String, f64)>,
}

impl Series {
    pub fn new(name: impl Into<String>, points: Vec<(String, f64)>) -> Self {
        Series {
            name: name.into(),
            points,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.points.iter().map(|(_, v)| v).sum()
    }

    pub fn max(&self) -> f64 {
        self.points
            .iter()
            .map(|(_, v)| *v)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn min(&self) -> f64 {
        self.points
            .iter()
            .map(|(_, v)| *v)
            .fold(f64::INFINITY, f64::min)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Pie,
    Scatter,
    Line,
}

/// Visual theme; passed explicitly with every render call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartStyle {
    #[default]
    Default,
    Ggplot,
}

impl FromStr for ChartStyle {
    type Err = ProcessorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(ChartStyle::Default),
            "ggplot" => Ok(ChartStyle::Ggplot),
            other => Err(ProcessorError::Render(format!("unknown chart style '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderOptions {
    pub title: Option<String>,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
    pub color: Option<String>,
    pub style: ChartStyle,
}

impl RenderOptions {
    pub fn titled(title: impl Into<String>, style: ChartStyle) -> Self {
        RenderOptions {
            title: Some(title.into()),
            style,
            ..Default::default()
        }
    }

    pub fn labels(mut self, x: impl Into<String>, y: impl Into<String>) -> Self {
        self.x_label = Some(x.into());
        self.y_label = Some(y.into());
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

pub trait Renderer {
    /// Draws one series
    fn render(&mut self, series: &Series, kind: ChartKind, options: &RenderOptions) -> Result<()>;

    /// Prints a block of records, e.g. a top-N ranking
    fn render_records(&mut self, title: &str, records: &[&EnrichedRecord]) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_stats() {
        let s = Series::new(
            "x",
            vec![("a".into(), 2.0), ("b".into(), 5.0), ("c".into(), 1.0)],
        );
        assert_eq!(s.total(), 8.0);
        assert_eq!(s.max(), 5.0);
        assert_eq!(s.min(), 1.0);
    }

    #[test]
    fn test_style_parse() {
        assert_eq!("GGPLOT".parse::<ChartStyle>().unwrap(), ChartStyle::Ggplot);
        assert!("seaborn".parse::<ChartStyle>().is_err());
    }
}
