use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::{debug, info};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Cell, Column, TabularDataset};
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Upload entry-point
// ---------------------------------------------------------------------------

/// Parse an uploaded file delivered as a data URL:
/// `data:<mime>;base64,<payload>`.
///
/// The MIME type itself is not checked (browsers label CSV files
/// inconsistently); the `data:` scheme and the `;base64` marker are.
pub fn parse(raw_content: &str) -> Result<TabularDataset> {
    let (header, payload) = raw_content
        .split_once(',')
        .ok_or_else(|| malformed("missing 'data:<mime>;base64,' prefix"))?;
    let media = header
        .trim_start()
        .strip_prefix("data:")
        .ok_or_else(|| malformed("upload does not start with 'data:'"))?;
    if !media.ends_with(";base64") {
        return Err(malformed("upload payload is not base64-encoded"));
    }

    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| malformed(format!("base64 decoding failed: {e}")))?;

    debug!("decoded {} bytes of {media} upload", bytes.len());
    parse_csv(&bytes)
}

/// Parse UTF-8 CSV text with a header row into a dataset.
pub fn parse_csv(bytes: &[u8]) -> Result<TabularDataset> {
    let text =
        std::str::from_utf8(bytes).map_err(|e| malformed(format!("not valid UTF-8: {e}")))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| malformed(format!("reading CSV header: {e}")))?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if h.is_empty() {
                format!("Unnamed: {i}")
            } else {
                h.to_string()
            }
        })
        .collect();
    if headers.is_empty() {
        return Err(malformed("CSV has no header row"));
    }

    let mut cells: Vec<Vec<Cell>> = vec![Vec::new(); headers.len()];
    for (row_no, result) in reader.records().enumerate() {
        let record = result.map_err(|e| malformed(format!("CSV row {row_no}: {e}")))?;
        for (col_idx, value) in record.iter().enumerate() {
            cells[col_idx].push(Cell::parse(value));
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, cells)| Column { name, cells })
        .collect();
    TabularDataset::from_columns(columns)
}

fn malformed(msg: impl Into<String>) -> PipelineError {
    PipelineError::MalformedUpload(msg.into())
}

// ---------------------------------------------------------------------------
// Files on disk
// ---------------------------------------------------------------------------

/// Load a table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row, one column per channel
/// * `.json`    – records: `[{ "ch1": 0.1, "ch2": 0.3 }, ...]`
/// * `.parquet` – flat numeric (or string) columns
pub fn load_file(path: &Path) -> anyhow::Result<TabularDataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "csv" | "txt" => {
            let bytes = std::fs::read(path).context("reading CSV file")?;
            parse_csv(&bytes)?
        }
        "json" => load_json(path)?,
        "parquet" | "pq" => load_parquet(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };

    info!(
        "Loaded {} columns x {} rows from {}",
        dataset.n_columns(),
        dataset.n_rows(),
        path.display()
    );
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records orientation, i.e. what `df.to_json(orient='records')` writes.
/// Keys absent from a record become missing cells.
fn load_json(path: &Path) -> anyhow::Result<TabularDataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut order: Vec<String> = Vec::new();
    let mut by_name: BTreeMap<String, Vec<Cell>> = BTreeMap::new();

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        for key in obj.keys() {
            if !by_name.contains_key(key) {
                order.push(key.clone());
                by_name.insert(key.clone(), vec![Cell::Missing; i]);
            }
        }
        for (key, cells) in by_name.iter_mut() {
            cells.push(obj.get(key).map_or(Cell::Missing, json_to_cell));
        }
    }

    let columns = order
        .into_iter()
        .map(|name| {
            let cells = by_name.remove(&name).unwrap_or_default();
            Column { name, cells }
        })
        .collect();
    Ok(TabularDataset::from_columns(columns)?)
}

fn json_to_cell(val: &JsonValue) -> Cell {
    match val {
        JsonValue::Number(n) => n.as_f64().map_or(Cell::Missing, Cell::Number),
        JsonValue::String(s) => Cell::Text(s.clone()),
        JsonValue::Null => Cell::Missing,
        other => Cell::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one flat column per channel.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> anyhow::Result<TabularDataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let names: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut cells: Vec<Vec<Cell>> = vec![Vec::new(); names.len()];

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for (col_idx, column_cells) in cells.iter_mut().enumerate() {
            let col = batch.column(col_idx);
            column_cells.extend((0..batch.num_rows()).map(|row| extract_cell(col, row)));
        }
    }

    let columns = names
        .into_iter()
        .zip(cells)
        .map(|(name, cells)| Column { name, cells })
        .collect();
    Ok(TabularDataset::from_columns(columns)?)
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> Cell {
    if col.is_null(row) {
        return Cell::Missing;
    }
    match col.data_type() {
        DataType::Float64 => Cell::Number(col.as_primitive::<Float64Type>().value(row)),
        DataType::Float32 => Cell::Number(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Int64 => Cell::Number(col.as_primitive::<Int64Type>().value(row) as f64),
        DataType::Int32 => Cell::Number(col.as_primitive::<Int32Type>().value(row) as f64),
        DataType::Utf8 => Cell::Text(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Cell::Text(col.as_string::<i64>().value(row).to_string()),
        DataType::Boolean => Cell::Text(col.as_boolean().value(row).to_string()),
        other => Cell::Text(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use crate::data::model::build;

    fn data_url(csv: &str) -> String {
        format!("data:text/csv;base64,{}", STANDARD.encode(csv))
    }

    #[test]
    fn parses_data_url() {
        let ds = parse(&data_url("a,b\n1,2\n3,4\n5,6\n")).unwrap();
        assert_eq!(ds.column_names(), vec!["a", "b"]);
        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.numeric_column("b").unwrap(), vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn accepts_any_mime_type() {
        let raw = format!(
            "data:application/vnd.ms-excel;base64,{}",
            STANDARD.encode("v\n1.5\n")
        );
        assert_eq!(parse(&raw).unwrap().numeric_column("v").unwrap(), vec![1.5]);
    }

    #[test]
    fn rejects_missing_prefix() {
        let bare = STANDARD.encode("a\n1\n");
        assert!(matches!(parse(&bare), Err(PipelineError::MalformedUpload(_))));
        let not_b64 = "data:text/csv,a\n1\n";
        assert!(matches!(parse(not_b64), Err(PipelineError::MalformedUpload(_))));
    }

    #[test]
    fn rejects_bad_base64_and_bad_utf8() {
        assert!(matches!(
            parse("data:text/csv;base64,@@@not-base64@@@"),
            Err(PipelineError::MalformedUpload(_))
        ));
        let raw = format!("data:text/csv;base64,{}", STANDARD.encode([0xff, 0xfe, 0x00]));
        assert!(matches!(parse(&raw), Err(PipelineError::MalformedUpload(_))));
    }

    #[test]
    fn rejects_ragged_rows_and_empty_input() {
        assert!(matches!(
            parse(&data_url("a,b\n1,2\n3\n")),
            Err(PipelineError::MalformedUpload(_))
        ));
        assert!(matches!(parse(&data_url("")), Err(PipelineError::MalformedUpload(_))));
    }

    #[test]
    fn text_only_fails_when_selected() {
        let ds = parse(&data_url("label,value\nfoo,1\nbar,2\n")).unwrap();
        assert_eq!(ds.numeric_column("value").unwrap(), vec![1.0, 2.0]);
        assert!(matches!(
            ds.numeric_column("label"),
            Err(PipelineError::MalformedUpload(_))
        ));
    }

    #[test]
    fn nan_and_inf_tokens_are_missing_and_fail_build() {
        let mut csv = String::from("x\n");
        for i in 0..400 {
            match i {
                200 => csv.push_str("nan\n"),
                300 => csv.push_str("-inf\n"),
                _ => csv.push_str(&format!("{}\n", (i as f64 * 0.1).sin())),
            }
        }
        let ds = parse(&data_url(&csv)).unwrap();
        assert_eq!(ds.column("x").unwrap().cells[200], Cell::Missing);
        assert_eq!(ds.column("x").unwrap().cells[300], Cell::Missing);
        match build(&ds, "x", 100.0, "mV") {
            Err(PipelineError::MalformedUpload(msg)) => assert!(msg.contains("row 200"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn trims_whitespace_and_names_blank_headers() {
        let ds = parse_csv(b" a , \n 1 , 2 \n").unwrap();
        assert_eq!(ds.column_names(), vec!["a", "Unnamed: 1"]);
        assert_eq!(ds.numeric_column("a").unwrap(), vec![1.0]);
    }

    #[test]
    fn loads_csv_and_json_files() {
        let dir = tempfile::tempdir().unwrap();

        let csv_path = dir.path().join("signal.csv");
        std::fs::File::create(&csv_path)
            .unwrap()
            .write_all(b"ch1,ch2\n0.5,1\n0.25,2\n")
            .unwrap();
        let ds = load_file(&csv_path).unwrap();
        assert_eq!(ds.numeric_column("ch1").unwrap(), vec![0.5, 0.25]);

        let json_path = dir.path().join("signal.json");
        std::fs::write(&json_path, r#"[{"ch1": 1.0, "ch2": 3}, {"ch1": 2.0}]"#).unwrap();
        let ds = load_file(&json_path).unwrap();
        assert_eq!(ds.column_names(), vec!["ch1", "ch2"]);
        assert_eq!(ds.numeric_column("ch1").unwrap(), vec![1.0, 2.0]);
        assert!(ds.numeric_column("ch2").is_err());

        assert!(load_file(&dir.path().join("signal.xyz")).is_err());
    }

    #[test]
    fn loads_parquet_columns() {
        use arrow::array::{ArrayRef, Float64Array, Int32Array, StringArray};
        use arrow::datatypes::{Field, Schema};
        use arrow::record_batch::RecordBatch;
        use parquet::arrow::ArrowWriter;

        let schema = Arc::new(Schema::new(vec![
            Field::new("v", DataType::Float64, true),
            Field::new("n", DataType::Int32, false),
            Field::new("s", DataType::Utf8, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Float64Array::from(vec![Some(0.5), None])) as ArrayRef,
                Arc::new(Int32Array::from(vec![1, 2])),
                Arc::new(StringArray::from(vec!["x", "y"])),
            ],
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signal.parquet");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let ds = load_file(&path).unwrap();
        assert_eq!(ds.column_names(), vec!["v", "n", "s"]);
        assert_eq!(ds.numeric_column("n").unwrap(), vec![1.0, 2.0]);
        assert_eq!(ds.column("v").unwrap().cells[1], Cell::Missing);
        assert!(ds.numeric_column("v").is_err());
        assert!(ds.numeric_column("s").is_err());
    }
}
