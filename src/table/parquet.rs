//! Parquet ledger reader
//!
//! Every column is rendered as text. Float columns go through
//! [`format_cell_number`] so a numeric account id such as `123.0` keeps its
//! digits intact.

use crate::error::{TableError, TableResult};
use crate::normalize::format_cell_number;
use crate::table::Table;
use ::arrow::array::{Array, ArrayRef, AsArray, StringArray};
use ::arrow::compute::cast;
use ::arrow::datatypes::{DataType, Float32Type, Float64Type};
use ::parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::File;
use std::path::Path;

/// Read a Parquet file into a text table
pub fn read_parquet(path: &Path) -> TableResult<Table> {
    let file = File::open(path).map_err(|source| TableError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build()?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch?;
        let rendered = batch
            .columns()
            .iter()
            .map(render_column)
            .collect::<TableResult<Vec<_>>>()?;

        for row in 0..batch.num_rows() {
            rows.push(rendered.iter().map(|col| col[row].clone()).collect());
        }
    }

    Ok(Table::new(columns, rows))
}

/// Render one Arrow column as text, nulls as empty cells
fn render_column(array: &ArrayRef) -> TableResult<Vec<String>> {
    let cells = match array.data_type() {
        DataType::Float64 => array
            .as_primitive::<Float64Type>()
            .iter()
            .map(|v| v.map(format_cell_number).unwrap_or_default())
            .collect(),
        DataType::Float32 => array
            .as_primitive::<Float32Type>()
            .iter()
            .map(|v| v.map(|v| format_cell_number(v as f64)).unwrap_or_default())
            .collect(),
        _ => {
            let text = cast(array, &DataType::Utf8)?;
            let text = text
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| {
                    TableError::Arrow(::arrow::error::ArrowError::CastError(format!(
                        "Cannot render column of type {} as text",
                        array.data_type()
                    )))
                })?;
            (0..text.len())
                .map(|i| {
                    if text.is_null(i) {
                        String::new()
                    } else {
                        text.value(i).to_string()
                    }
                })
                .collect()
        }
    };
    Ok(cells)
}
