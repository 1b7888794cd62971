//! Spreadsheet ledger reader
//!
//! Reads the first worksheet of an Excel or OpenDocument workbook. The first
//! row is the header. Numeric cells go through [`format_cell_number`] so that
//! an account id stored as `2001` does not come back as `2001.0`.

use crate::error::{TableError, TableResult};
use crate::normalize::format_cell_number;
use crate::table::Table;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::debug;

/// Read the first worksheet of a workbook into a text table
pub fn read_xlsx(path: &Path) -> TableResult<Table> {
    let file = File::open(path).map_err(|source| TableError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut bytes = Vec::new();
    let mut file = file;
    file.read_to_end(&mut bytes).map_err(calamine::Error::Io)?;
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let sheet_names = workbook.sheet_names();
    let Some(range) = workbook.worksheet_range_at(0) else {
        debug!(path = %path.display(), "Workbook has no worksheets");
        return Ok(Table::default());
    };
    let range = range?;

    debug!(
        path = %path.display(),
        sheet = sheet_names.first().map(String::as_str).unwrap_or(""),
        rows = range.height(),
        "Reading worksheet"
    );

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Table::default());
    };
    let columns = header.iter().map(render_cell).collect();
    let rows = rows
        .map(|row| row.iter().map(render_cell).collect())
        .collect();

    Ok(Table::new(columns, rows))
}

/// Render one cell as text, empty cells as empty strings
fn render_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(v) => format_cell_number(*v),
        Data::Int(v) => v.to_string(),
        other => other.to_string(),
    }
}
