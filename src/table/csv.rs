//! CSV ledger reader

use crate::error::{TableError, TableResult};
use crate::table::Table;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

const UTF8_BOM: char = '\u{feff}';

/// Read a CSV file with a header row
///
/// Rows may be ragged; short rows are padded with empty cells.
pub fn read_csv(path: &Path) -> TableResult<Table> {
    let file = File::open(path).map_err(|source| TableError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let columns = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, name)| {
            if i == 0 {
                name.trim_start_matches(UTF8_BOM).to_string()
            } else {
                name.to_string()
            }
        })
        .collect::<Vec<_>>();

    let rows = reader
        .records()
        .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
        .collect::<Result<Vec<Vec<String>>, _>>()?;

    Ok(Table::new(columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_read_csv_with_bom() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.csv");
        fs::write(&path, "\u{feff}Account,Amount\n2001,\"1,200.50\"\n٣٠٠٢,90\n").unwrap();

        let table = read_csv(&path).unwrap();
        assert_eq!(table.columns, vec!["Account", "Amount"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0], vec!["2001", "1,200.50"]);
        assert_eq!(table.rows[1], vec!["٣٠٠٢", "90"]);
    }

    #[test]
    fn test_read_csv_ragged_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.csv");
        fs::write(&path, "Account,Amount,Note\n1,2\n").unwrap();

        let table = read_csv(&path).unwrap();
        assert_eq!(table.rows[0], vec!["1", "2", ""]);
    }

    #[test]
    fn test_read_csv_missing_file() {
        let err = read_csv(Path::new("/nonexistent/ledger.csv")).unwrap_err();
        assert!(matches!(err, TableError::Open { .. }));
    }
}
