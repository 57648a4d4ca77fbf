use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{LongDataset, Observation, Scalar};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a long-form observation table from a file.  Dispatch by extension.
///
/// `time_field` and `value_field` name the two reserved columns; every other
/// column is treated as run metadata.
///
/// Supported formats:
/// * `.parquet` – flat scalar columns (recommended)
/// * `.json`    – `[{ "Time": 0, "Signal": 1.0, ...meta }, ...]`
/// * `.csv`     – header row, one observation per line
pub fn load_file(path: &Path, time_field: &str, value_field: &str) -> Result<LongDataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => load_parquet(path, time_field, value_field),
        "json" => load_json(path, time_field, value_field),
        "csv" => load_csv(path, time_field, value_field),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   {
///     "Time": 0,
///     "Signal": 1.0,
///     "ExpDay": "Day 1",
///     "Batch": 1234
///   },
///   ...
/// ]
/// ```
fn load_json(path: &Path, time_field: &str, value_field: &str) -> Result<LongDataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut observations = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let time = obj
            .get(time_field)
            .with_context(|| format!("Row {i}: missing '{time_field}' column"))?;
        let value = obj
            .get(value_field)
            .with_context(|| format!("Row {i}: missing '{value_field}' column"))?;

        let mut metadata = BTreeMap::new();
        for (key, val) in obj {
            if key == time_field || key == value_field {
                continue;
            }
            metadata.insert(key.clone(), json_to_scalar(val));
        }

        observations.push(Observation {
            metadata,
            time: json_to_scalar(time),
            value: json_to_scalar(value),
        });
    }

    Ok(LongDataset::from_observations(observations))
}

fn json_to_scalar(val: &JsonValue) -> Scalar {
    match val {
        JsonValue::String(s) => Scalar::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Scalar::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Scalar::Float(f)
            } else {
                Scalar::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => Scalar::Bool(*b),
        JsonValue::Null => Scalar::Null,
        other => Scalar::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one observation per data row.
/// The time and value columns plus all metadata columns hold plain scalars;
/// cell types are inferred (integer → float → bool → string, empty → null).
fn load_csv(path: &Path, time_field: &str, value_field: &str) -> Result<LongDataset> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let time_idx = headers
        .iter()
        .position(|h| h == time_field)
        .with_context(|| format!("CSV missing '{time_field}' column"))?;
    let value_idx = headers
        .iter()
        .position(|h| h == value_field)
        .with_context(|| format!("CSV missing '{value_field}' column"))?;

    let mut observations = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let time = guess_scalar_type(record.get(time_idx).unwrap_or(""));
        let value = guess_scalar_type(record.get(value_idx).unwrap_or(""));

        let mut metadata = BTreeMap::new();
        for (col_idx, cell) in record.iter().enumerate() {
            if col_idx == time_idx || col_idx == value_idx {
                continue;
            }
            let col_name = &headers[col_idx];
            metadata.insert(col_name.clone(), guess_scalar_type(cell));
        }

        observations.push(Observation {
            metadata,
            time,
            value,
        });
    }

    Ok(LongDataset::from_observations(observations))
}

fn guess_scalar_type(s: &str) -> Scalar {
    if s.is_empty() {
        return Scalar::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Scalar::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Scalar::Float(f);
    }
    if s == "true" || s == "false" {
        return Scalar::Bool(s == "true");
    }
    Scalar::String(s.to_string())
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file containing a long-form observation table.
///
/// Expected schema: flat scalar columns only — the time and value columns
/// plus any number of metadata columns (strings, ints, floats, bools).
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path, time_field: &str, value_field: &str) -> Result<LongDataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut observations = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let n_rows = batch.num_rows();

        let time_idx = schema
            .index_of(time_field)
            .map_err(|_| anyhow::anyhow!("Parquet file missing '{time_field}' column"))?;
        let value_idx = schema
            .index_of(value_field)
            .map_err(|_| anyhow::anyhow!("Parquet file missing '{value_field}' column"))?;

        let time_col = batch.column(time_idx);
        let value_col = batch.column(value_idx);

        // Collect metadata column indices (everything except time, value)
        let meta_cols: Vec<(usize, String)> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != time_idx && *i != value_idx)
            .map(|(i, f)| (i, f.name().clone()))
            .collect();

        for row in 0..n_rows {
            let time = extract_scalar(time_col, row)
                .with_context(|| format!("Row {row}: failed to read '{time_field}'"))?;
            let value = extract_scalar(value_col, row)
                .with_context(|| format!("Row {row}: failed to read '{value_field}'"))?;

            let mut metadata = BTreeMap::new();
            for (col_idx, col_name) in &meta_cols {
                let col_array = batch.column(*col_idx);
                let cell = extract_scalar(col_array, row).with_context(|| {
                    format!("Row {row}: failed to read metadata column '{col_name}'")
                })?;
                metadata.insert(col_name.clone(), cell);
            }

            observations.push(Observation {
                metadata,
                time,
                value,
            });
        }
    }

    Ok(LongDataset::from_observations(observations))
}

// -- Parquet / Arrow helpers --

/// Extract a single scalar value from an Arrow column at a given row.
fn extract_scalar(col: &Arc<dyn Array>, row: usize) -> Result<Scalar> {
    if col.is_null(row) {
        return Ok(Scalar::Null);
    }
    let scalar = match col.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 => {
            if let Some(s) = col.as_any().downcast_ref::<StringArray>() {
                Scalar::String(s.value(row).to_string())
            } else {
                // LargeStringArray
                let s = col.as_string::<i64>();
                Scalar::String(s.value(row).to_string())
            }
        }
        DataType::Int32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Int32Array>()
                .context("expected Int32Array")?;
            Scalar::Integer(arr.value(row) as i64)
        }
        DataType::Int64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Int64Array>()
                .context("expected Int64Array")?;
            Scalar::Integer(arr.value(row))
        }
        DataType::Float32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float32Array>()
                .context("expected Float32Array")?;
            Scalar::Float(arr.value(row) as f64)
        }
        DataType::Float64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float64Array>()
                .context("expected Float64Array")?;
            Scalar::Float(arr.value(row))
        }
        DataType::Boolean => {
            let arr = col
                .as_any()
                .downcast_ref::<BooleanArray>()
                .context("expected BooleanArray")?;
            Scalar::Bool(arr.value(row))
        }
        other => bail!("Unsupported column type {other:?}"),
    };
    Ok(scalar)
}
