//! Parquet report writer
//!
//! Original columns are stored as text, the fetched amount as a nullable
//! `Float64` and the classification as its label.

use crate::error::{PersistError, PersistResult};
use crate::report::{Report, FETCHED_AMOUNT_COLUMN, RESULT_COLUMN};
use ::arrow::array::{ArrayRef, Float64Builder, StringBuilder};
use ::arrow::datatypes::{DataType, Field, Schema};
use ::arrow::record_batch::RecordBatch;
use ::parquet::arrow::ArrowWriter;
use ::parquet::basic::{Compression, ZstdLevel};
use ::parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// ZSTD level used for report files
const COMPRESSION_LEVEL: i32 = 3;

/// Build the Arrow schema for a report
pub fn report_schema(report: &Report) -> Schema {
    let mut fields: Vec<Field> = report
        .columns
        .iter()
        .map(|name| Field::new(name, DataType::Utf8, true))
        .collect();
    fields.push(Field::new(FETCHED_AMOUNT_COLUMN, DataType::Float64, true));
    fields.push(Field::new(RESULT_COLUMN, DataType::Utf8, false));
    Schema::new(fields)
}

fn writer_properties() -> PersistResult<WriterProperties> {
    let level = ZstdLevel::try_new(COMPRESSION_LEVEL)?;
    Ok(WriterProperties::builder()
        .set_compression(Compression::ZSTD(level))
        .build())
}

/// Write a report as a single Parquet file
pub fn write_parquet(report: &Report, path: &Path) -> PersistResult<()> {
    let schema = Arc::new(report_schema(report));

    let mut column_builders: Vec<StringBuilder> =
        report.columns.iter().map(|_| StringBuilder::new()).collect();
    let mut fetched = Float64Builder::with_capacity(report.len());
    let mut result = StringBuilder::new();

    for row in &report.rows {
        for (builder, cell) in column_builders.iter_mut().zip(row.cells.iter()) {
            builder.append_value(cell);
        }
        fetched.append_option(row.fetched);
        result.append_value(row.classification.label());
    }

    let mut arrays: Vec<ArrayRef> = column_builders
        .iter_mut()
        .map(|b| Arc::new(b.finish()) as ArrayRef)
        .collect();
    arrays.push(Arc::new(fetched.finish()));
    arrays.push(Arc::new(result.finish()));

    let batch = RecordBatch::try_new(Arc::clone(&schema), arrays)?;

    let file = File::create(path).map_err(|source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = ArrowWriter::try_new(file, schema, Some(writer_properties()?))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}
