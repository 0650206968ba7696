use serde::Serialize;
use std::io::Write;

use crate::processor::{Result, record::EnrichedRecord};
use crate::render::{ChartKind, RenderOptions, Renderer, Series};

/// Writes one JSON document per line, for external plotting tools
#[derive(Debug)]
pub struct JsonRenderer<W: Write> {
    out: W,
}

#[derive(Serialize)]
struct ChartDoc<'a> {
    kind: ChartKind,
    #[serde(flatten)]
    options: &'a RenderOptions,
    series: &'a Series,
}

#[derive(Serialize)]
struct RecordsDoc<'a> {
    title: &'a str,
    records: &'a [&'a EnrichedRecord],
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W) -> Self {
        JsonRenderer { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit<T: Serialize>(&mut self, doc: &T) -> Result<()> {
        serde_json::to_writer(&mut self.out, doc)?;
        writeln!(self.out)?;
        Ok(())
    }
}

impl<W: Write> Renderer for JsonRenderer<W> {
    fn render(&mut self, series: &Series, kind: ChartKind, options: &RenderOptions) -> Result<()> {
        self.emit(&ChartDoc {
            kind,
            options,
            series,
        })
    }

    fn render_records(&mut self, title: &str, records: &[&EnrichedRecord]) -> Result<()> {
        self.emit(&RecordsDoc { title, records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::record::{SalesRecord, StoreId};
    use crate::render::ChartStyle;
    use chrono::NaiveDate;

    #[test]
    fn test_chart_document_shape() {
        let mut r = JsonRenderer::new(Vec::new());
        let series = Series::new("revenue by year", vec![("2019".into(), 25.0)]);
        let options = RenderOptions::titled("Revenue", ChartStyle::Ggplot).color("red");
        r.render(&series, ChartKind::Pie, &options).unwrap();

        let out = String::from_utf8(r.into_inner()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(out.trim_end()).unwrap();
        assert_eq!(doc["kind"], "pie");
        assert_eq!(doc["title"], "Revenue");
        assert_eq!(doc["style"], "ggplot");
        assert_eq!(doc["color"], "red");
        assert_eq!(doc["series"]["points"][0][0], "2019");
        assert_eq!(doc["series"]["points"][0][1], 25.0);
    }

    #[test]
    fn test_records_document_includes_derived_columns() {
        let record = EnrichedRecord::derive(SalesRecord {
            store_id: StoreId::new("1520"),
            city: "Aracaju".into(),
            date: NaiveDate::from_ymd_opt(2018, 2, 1).unwrap(),
            unit_price: 3.0,
            quantity: 4,
        });
        let mut r = JsonRenderer::new(Vec::new());
        r.render_records("top", &[&record]).unwrap();

        let out = String::from_utf8(r.into_inner()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(out.trim_end()).unwrap();
        let rec = &doc["records"][0];
        assert_eq!(rec["store_id"], "1520");
        assert_eq!(rec["date"], "2018-02-01");
        assert_eq!(rec["revenue"], 12.0);
        assert_eq!(rec["quarter"], 1);
    }
}
