#![cfg(feature = "spreadsheet")]

use std::io::Write;

use chrono::NaiveDate;
use sales_report::{
    AggregateOp, AggregateResult, Dimension, GroupKey, Measure, ProcessorError, SalesTable,
    Value, load_sources,
};
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// One worksheet cell
enum Cell<'a> {
    Text(&'a str),
    Number(f64),
    /// serial day number styled with the built-in date format
    Date(f64),
    Error(&'a str),
}

fn sheet_xml(rows: &[Vec<Cell>]) -> String {
    let mut xml = format!(r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="{MAIN_NS}"><sheetData>"#);
    for (r, row) in rows.iter().enumerate() {
        xml.push_str(&format!(r#"<row r="{}">"#, r + 1));
        for (c, cell) in row.iter().enumerate() {
            let pos = format!("{}{}", (b'A' + c as u8) as char, r + 1);
            xml.push_str(&match cell {
                Cell::Text(t) => format!(r#"<c r="{pos}" t="inlineStr"><is><t>{t}</t></is></c>"#),
                Cell::Number(v) => format!(r#"<c r="{pos}"><v>{v}</v></c>"#),
                Cell::Date(v) => format!(r#"<c r="{pos}" s="1"><v>{v}</v></c>"#),
                Cell::Error(e) => format!(r#"<c r="{pos}" t="e"><v>{e}</v></c>"#),
            });
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Minimal single-sheet xlsx package
fn workbook(rows: &[Vec<Cell>]) -> NamedTempFile {
    let file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
    let mut zip = ZipWriter::new(file.reopen().unwrap());
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    let parts = [
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#.to_string(),
        ),
        (
            "_rels/.rels",
            format!(r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="{PKG_REL_NS}"><Relationship Id="rId1" Type="{REL_NS}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#),
        ),
        (
            "xl/workbook.xml",
            format!(r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="{MAIN_NS}" xmlns:r="{REL_NS}"><sheets><sheet name="Natal" sheetId="1" r:id="rId1"/></sheets></workbook>"#),
        ),
        (
            "xl/_rels/workbook.xml.rels",
            format!(r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="{PKG_REL_NS}"><Relationship Id="rId1" Type="{REL_NS}/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="{REL_NS}/styles" Target="styles.xml"/></Relationships>"#),
        ),
        (
            "xl/styles.xml",
            format!(r#"<?xml version="1.0" encoding="UTF-8"?><styleSheet xmlns="{MAIN_NS}"><cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="14" applyNumberFormat="1"/></cellXfs></styleSheet>"#),
        ),
        ("xl/worksheets/sheet1.xml", sheet_xml(rows)),
    ];
    for (name, body) in parts {
        zip.start_file(name, options).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    file
}

fn header() -> Vec<Cell<'static>> {
    ["Cidade", "Data", "Vendas", "LojaID", "Qtde"]
        .into_iter()
        .map(Cell::Text)
        .collect()
}

#[test]
fn test_workbook_loads_end_to_end() {
    // 43480 = 2019-01-15, 43160 = 2018-03-01
    let book = workbook(&[
        header(),
        vec![
            Cell::Text("Natal"),
            Cell::Date(43480.0),
            Cell::Number(12.5),
            Cell::Number(1520.0),
            Cell::Number(2.0),
        ],
        vec![
            Cell::Text("Natal"),
            Cell::Date(43160.0),
            Cell::Number(3.0),
            Cell::Number(1521.0),
            Cell::Number(4.0),
        ],
    ]);

    let raw = load_sources(&[book.path()]).unwrap();
    assert_eq!(raw.row_count(), 2);
    assert!(matches!(raw.records[0].date, Some(Value::Float(v)) if v == 43480.0));

    let (table, nulls) = SalesTable::from_raw(&raw).unwrap();
    assert_eq!(nulls.total(), 0);

    let first = &table.records()[0];
    assert_eq!(first.store_id().as_str(), "1520");
    assert_eq!(first.city(), "Natal");
    assert_eq!(first.date(), NaiveDate::from_ymd_opt(2019, 1, 15).unwrap());
    assert_eq!(first.quantity(), 2);
    assert_eq!(first.revenue(), 25.0);
    assert_eq!(
        table.records()[1].date(),
        NaiveDate::from_ymd_opt(2018, 3, 1).unwrap()
    );

    let by_year = table
        .group_by(&[Dimension::Year], Measure::Revenue, AggregateOp::Sum)
        .unwrap();
    assert_eq!(
        by_year.get(&GroupKey::number(2018)),
        Some(&AggregateResult::Float(12.0))
    );
}

#[test]
fn test_workbook_and_csv_sources_concatenate() {
    let book = workbook(&[
        header(),
        vec![
            Cell::Text("Natal"),
            Cell::Date(43480.0),
            Cell::Number(1.0),
            Cell::Number(853.0),
            Cell::Number(1.0),
        ],
    ]);
    let mut csv = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    write!(csv, "LojaID,Cidade,Data,Vendas,Qtde\n1520,Recife,2019-01-02,2,1\n").unwrap();

    let raw = load_sources(&[book.path(), csv.path()]).unwrap();
    let (table, _) = SalesTable::from_raw(&raw).unwrap();
    let stores: Vec<&str> = table.iter().map(|r| r.store_id().as_str()).collect();
    assert_eq!(stores, ["853", "1520"]);
}

#[test]
fn test_error_cell_fails_with_location() {
    let book = workbook(&[
        header(),
        vec![
            Cell::Text("Natal"),
            Cell::Date(43480.0),
            Cell::Error("#VALUE!"),
            Cell::Number(1520.0),
            Cell::Number(2.0),
        ],
    ]);
    match load_sources(&[book.path()]) {
        Err(ProcessorError::Parse(msg)) => {
            assert!(msg.contains(":2: column unit_price"), "{msg}");
        }
        other => panic!("expected Parse error, got {other:?}"),
    }
}

#[test]
fn test_workbook_missing_header() {
    let book = workbook(&[vec![
        Cell::Text("Cidade"),
        Cell::Text("Data"),
        Cell::Text("Vendas"),
        Cell::Text("LojaID"),
    ]]);
    assert!(matches!(
        load_sources(&[book.path()]),
        Err(ProcessorError::MissingColumn(c)) if c == "quantity"
    ));
}
