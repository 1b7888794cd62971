//! CSV report writer
//!
//! Output starts with a UTF-8 byte order mark; spreadsheet tools otherwise
//! misread Arabic column names and labels as a legacy code page.

use crate::error::{PersistError, PersistResult};
use crate::report::{format_amount, Report};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Write a report as CSV with a UTF-8 BOM
pub fn write_csv(report: &Report, path: &Path) -> PersistResult<()> {
    let io_err = |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut out = BufWriter::new(File::create(path).map_err(io_err)?);
    out.write_all(UTF8_BOM).map_err(io_err)?;

    let mut writer = ::csv::Writer::from_writer(out);
    writer.write_record(report.header())?;
    for row in &report.rows {
        let mut record = row.cells.clone();
        record.push(format_amount(row.fetched));
        record.push(row.classification.label().to_string());
        writer.write_record(&record)?;
    }

    writer.flush().map_err(io_err)?;
    Ok(())
}
