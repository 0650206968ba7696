use memchr::{memchr, memchr_iter};
use memmap2::Mmap;
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use std::{fs::File, path::Path};
use tracing::debug;

use crate::loader::{HeaderMap, RawField};
use crate::processor::{ProcessorError, Result, Value, raw::RawRecord};

/// A bad cell inside one chunk; `line` is chunk-local
#[derive(Debug)]
struct ChunkError {
    line: usize,
    column: &'static str,
    value: String,
    reason: String,
}

/// Loads a comma-separated file into raw rows using memory mapping.
///
/// Chunks are parsed in parallel and stitched back in file order. Fields
/// may be wrapped in double quotes but cannot contain commas.
///
/// # Errors
/// Returns a [`ProcessorError`] if:
/// - the file cannot be opened or mapped
/// - the header lacks one of the five columns
/// - a row has the wrong number of fields or a malformed number
pub fn load_csv(path: &Path) -> Result<Vec<RawRecord>> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Err(ProcessorError::Parse(format!(
            "{}: missing header line",
            path.display()
        )));
    }
    let mmap = unsafe { Mmap::map(&file)? };
    parse_csv(&mmap[..], &path.display().to_string())
}

/// Parses an in-memory CSV document; `source` only names it in errors
pub fn parse_csv(buf: &[u8], source: &str) -> Result<Vec<RawRecord>> {
    let header_end = memchr(b'\n', buf).unwrap_or(buf.len());
    let headers: Vec<String> = buf[..header_end]
        .split(|&b| b == b',')
        .map(|s| String::from_utf8_lossy(s.trim_ascii()).to_string())
        .collect();
    let header_map = HeaderMap::resolve(&headers)?;

    let data = buf.get(header_end + 1..).unwrap_or_default();

    // Find chunk boundaries (split by newlines)
    let num_threads = rayon::current_num_threads();
    let chunks = find_chunk_boundaries(data, num_threads);

    let results: Vec<std::result::Result<Vec<RawRecord>, ChunkError>> = chunks
        .par_iter()
        .enumerate()
        .map(|(chunk_idx, (start, end))| {
            debug!(chunk_idx, bytes = end - start, "parsing chunk");
            parse_chunk(&data[*start..*end], &header_map)
        })
        .collect();

    let mut records = Vec::new();
    // header is line 1
    let mut line_base = 2;
    for ((start, end), result) in chunks.iter().zip(results) {
        match result {
            Ok(rows) => records.extend(rows),
            Err(e) => {
                return Err(ProcessorError::Parse(format!(
                    "{source}:{}: column {}: '{}': {}",
                    line_base + e.line,
                    e.column,
                    e.value,
                    e.reason
                )));
            }
        }
        line_base += memchr_iter(b'\n', &data[*start..*end]).count();
    }

    Ok(records)
}

fn find_chunk_boundaries(data: &[u8], num_chunks: usize) -> Vec<(usize, usize)> {
    if data.is_empty() {
        return vec![];
    }

    let num_chunks = num_chunks.max(1);
    let chunk_size = data.len() / num_chunks;
    let mut boundaries = Vec::with_capacity(num_chunks);
    let mut start = 0;

    for i in 0..num_chunks - 1 {
        let mut end = ((i + 1) * chunk_size).max(start);

        // Find next newline
        end = match memchr(b'\n', &data[end..]) {
            Some(offset) => end + offset + 1, // Include the newline
            None => data.len(),
        };

        if start < end {
            boundaries.push((start, end));
        }
        start = end;
        if start >= data.len() {
            break;
        }
    }

    // Last chunk gets everything remaining
    if start < data.len() {
        boundaries.push((start, data.len()));
    }

    boundaries
}

fn parse_chunk(chunk: &[u8], header: &HeaderMap) -> std::result::Result<Vec<RawRecord>, ChunkError> {
    let mut rows = Vec::with_capacity(chunk.len() / 32 + 1);
    let mut fields: Vec<&[u8]> = Vec::with_capacity(header.width());

    for (line_idx, line) in chunk.split(|&b| b == b'\n').enumerate() {
        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }

        // Split line into fields
        fields.clear();
        let mut field_start = 0;
        for comma_pos in memchr_iter(b',', line) {
            fields.push(unquote(&line[field_start..comma_pos]));
            field_start = comma_pos + 1;
        }
        fields.push(unquote(&line[field_start..]));

        if fields.len() != header.width() {
            return Err(ChunkError {
                line: line_idx,
                column: "",
                value: String::from_utf8_lossy(line).to_string(),
                reason: format!("expected {} fields, got {}", header.width(), fields.len()),
            });
        }

        let cell = |field: RawField| fields[header.position(field)];
        let err = |field: RawField, reason: &str| ChunkError {
            line: line_idx,
            column: field.name(),
            value: String::from_utf8_lossy(cell(field)).to_string(),
            reason: reason.to_string(),
        };

        rows.push(RawRecord {
            store_id: dynamic_cell(cell(RawField::StoreId)),
            city: text_cell(cell(RawField::City)),
            date: dynamic_cell(cell(RawField::Date)),
            unit_price: float_cell(cell(RawField::UnitPrice))
                .map_err(|_| err(RawField::UnitPrice, "not a number"))?,
            quantity: count_cell(cell(RawField::Quantity))
                .map_err(|_| err(RawField::Quantity, "not an integer in 0..=i64::MAX"))?,
        });
    }

    Ok(rows)
}

fn unquote(field: &[u8]) -> &[u8] {
    let field = field.trim_ascii();
    match field {
        [b'"', inner @ .., b'"'] => inner,
        _ => field,
    }
}

/// Int, then float, then text, the way a dataframe would type the cell
fn dynamic_cell(field: &[u8]) -> Option<Value> {
    if field.is_empty() {
        None
    } else if let Ok(v) = atoi_simd::parse::<i64>(field) {
        Some(Value::Int(v))
    } else if let Ok(v) = fast_float::parse::<f64, _>(field) {
        Some(Value::Float(v))
    } else {
        Some(Value::Str(String::from_utf8_lossy(field).to_string()))
    }
}

fn text_cell(field: &[u8]) -> Option<String> {
    if field.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(field).to_string())
    }
}

fn float_cell(field: &[u8]) -> std::result::Result<Option<f64>, ()> {
    if field.is_empty() {
        return Ok(None);
    }
    match fast_float::parse::<f64, _>(field) {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(()),
    }
}

fn count_cell(field: &[u8]) -> std::result::Result<Option<u64>, ()> {
    if field.is_empty() {
        return Ok(None);
    }
    // quantities must stay summable as i64
    if let Ok(v) = atoi_simd::parse::<i64>(field) {
        return u64::try_from(v).map(Some).map_err(|_| ());
    }
    // spreadsheets exported to CSV often write integers as `3.0`
    match fast_float::parse::<f64, _>(field) {
        Ok(v) if v >= 0.0 && v.fract() == 0.0 && v < i64::MAX as f64 => Ok(Some(v as u64)),
        _ => Err(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Cidade,Data,Vendas,LojaID,Qtde\n";

    #[test]
    fn test_parse_rows_in_order() {
        let csv = format!(
            "{HEADER}Aracaju,2018-01-01,142.0,1520,1\nAracaju,2018-01-01,14.21,1522,6\r\nNatal,2019-03-02,\"25.5\",853,3.0"
        );
        let rows = parse_csv(csv.as_bytes(), "mem").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].store_id, Some(Value::Int(1520)));
        assert_eq!(rows[0].date, Some(Value::Str("2018-01-01".into())));
        assert_eq!(rows[1].unit_price, Some(14.21));
        assert_eq!(rows[1].quantity, Some(6));
        assert_eq!(rows[2].city.as_deref(), Some("Natal"));
        assert_eq!(rows[2].unit_price, Some(25.5));
        assert_eq!(rows[2].quantity, Some(3));
    }

    #[test]
    fn test_empty_cells_are_missing() {
        let csv = format!("{HEADER},2018-01-01,,1520,\n");
        let rows = parse_csv(csv.as_bytes(), "mem").unwrap();
        assert_eq!(rows[0].city, None);
        assert_eq!(rows[0].unit_price, None);
        assert_eq!(rows[0].quantity, None);
    }

    #[test]
    fn test_bad_number_reports_line() {
        let csv = format!("{HEADER}Natal,2019-01-01,1.0,1,2\n\nNatal,2019-01-01,abc,1,2\n");
        let err = parse_csv(csv.as_bytes(), "Natal.csv").unwrap_err();
        match err {
            ProcessorError::Parse(msg) => {
                assert!(msg.starts_with("Natal.csv:4: column unit_price"), "{msg}");
            }
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_field_count_mismatch() {
        let csv = format!("{HEADER}Natal,2019-01-01,1.0,1\n");
        assert!(matches!(
            parse_csv(csv.as_bytes(), "mem"),
            Err(ProcessorError::Parse(_))
        ));
    }

    #[test]
    fn test_chunk_boundaries_cover_data() {
        let data = b"a\nbb\nccc\ndddd\neeeee\n";
        for n in 1..8 {
            let chunks = find_chunk_boundaries(data, n);
            assert_eq!(chunks.first().map(|c| c.0), Some(0));
            assert_eq!(chunks.last().map(|c| c.1), Some(data.len()));
            assert!(chunks.windows(2).all(|w| w[0].1 == w[1].0));
            assert!(chunks.iter().all(|(_, e)| data[e - 1] == b'\n'));
        }
    }

    #[test]
    fn test_quantity_beyond_i64_rejected() {
        let ok = format!("{HEADER}Natal,2019-01-01,1.0,1,{}\n", i64::MAX);
        assert_eq!(
            parse_csv(ok.as_bytes(), "mem").unwrap()[0].quantity,
            Some(i64::MAX as u64)
        );

        for qty in ["9223372036854775808", "18446744073709551615", "1e19", "-3"] {
            let csv = format!("{HEADER}Natal,2019-01-01,1.0,1,{qty}\n");
            match parse_csv(csv.as_bytes(), "Natal.csv") {
                Err(ProcessorError::Parse(msg)) => {
                    assert!(msg.starts_with("Natal.csv:2: column quantity"), "{msg}")
                }
                other => panic!("expected Parse error for {qty}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_header_only() {
        assert!(parse_csv(HEADER.as_bytes(), "mem").unwrap().is_empty());
    }
}
