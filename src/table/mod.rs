//! Ledger input tables
//!
//! Input is read into a plain text table regardless of the source format;
//! all interpretation (account normalization, amount parsing) happens later
//! in the reconciliation engine.
//!
//! # Module Structure
//!
//! - `xlsx`: Excel / OpenDocument reader (first worksheet)
//! - `csv`: UTF-8 CSV reader (BOM tolerant)
//! - `parquet`: Parquet reader, every column rendered as text

pub mod csv;
pub mod parquet;
pub mod xlsx;

use crate::error::{ConfigError, TableError, TableResult};
use std::path::Path;
use tracing::{info, warn};

/// Aliases recognized for the account column, in priority order
pub const ACCOUNT_ALIASES: &[&str] = &[
    "رقم الحساب",
    "الحساب",
    "Account",
    "account",
    "contract",
    "رقم العقد",
];

/// Aliases recognized for the amount column, in priority order
pub const AMOUNT_ALIASES: &[&str] = &["مبلغ المديونية", "المديونية", "amount", "Amount", "المبلغ"];

/// A text table with named columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Create a table, padding or truncating rows to the column count
    ///
    /// Cells past the last named column are dropped with a warning.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(index, mut row)| {
                if row.len() > width {
                    warn!(
                        row = index,
                        cells = row.len(),
                        columns = width,
                        dropped = ?&row[width..],
                        "Row is wider than the header, extra cells dropped"
                    );
                }
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no data rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read a ledger table, choosing the format from the file extension
pub fn read_table(path: &Path) -> TableResult<Table> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());

    let table = match extension.as_deref() {
        Some("xlsx" | "xlsm" | "xls" | "ods") => xlsx::read_xlsx(path)?,
        Some("csv") => csv::read_csv(path)?,
        Some("parquet") => parquet::read_parquet(path)?,
        _ => {
            return Err(TableError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
        }
    };

    info!(
        path = %path.display(),
        rows = table.len(),
        columns = table.columns.len(),
        "Read input table"
    );
    Ok(table)
}

/// Resolved positions of the account and amount columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRoles {
    pub account: usize,
    pub amount: usize,
}

/// Detect the account and amount columns by alias
pub fn detect_columns(columns: &[String]) -> Result<ColumnRoles, ConfigError> {
    let account = find_column(columns, ACCOUNT_ALIASES);
    let amount = find_column(columns, AMOUNT_ALIASES);

    match (account, amount) {
        (Some(account), Some(amount)) => Ok(ColumnRoles { account, amount }),
        _ => Err(ConfigError::ColumnsNotFound {
            available: columns.to_vec(),
        }),
    }
}

/// Find a column by exact or case-insensitive name, then by substring
fn find_column(columns: &[String], aliases: &[&str]) -> Option<usize> {
    let exact = columns.iter().position(|column| {
        let name = column.trim();
        aliases
            .iter()
            .any(|alias| name == *alias || name.to_lowercase() == alias.to_lowercase())
    });
    if exact.is_some() {
        return exact;
    }

    columns.iter().position(|column| {
        let name = column.trim().to_lowercase();
        aliases
            .iter()
            .any(|alias| name.contains(&alias.to_lowercase()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_detect_exact() {
        let roles = detect_columns(&cols(&["Name", "Account", "Amount"])).unwrap();
        assert_eq!(roles, ColumnRoles { account: 1, amount: 2 });
    }

    #[test]
    fn test_detect_arabic_and_case_insensitive() {
        let roles = detect_columns(&cols(&["مبلغ المديونية", " رقم الحساب "])).unwrap();
        assert_eq!(roles, ColumnRoles { account: 1, amount: 0 });

        let roles = detect_columns(&cols(&["ACCOUNT", "AMOUNT"])).unwrap();
        assert_eq!(roles, ColumnRoles { account: 0, amount: 1 });
    }

    #[test]
    fn test_exact_match_wins_over_substring() {
        let roles = detect_columns(&cols(&["contract_id", "Amount", "account"])).unwrap();
        assert_eq!(roles.account, 2);
    }

    #[test]
    fn test_detect_substring_fallback() {
        let roles = detect_columns(&cols(&["Customer Account No", "Total amount due"])).unwrap();
        assert_eq!(roles, ColumnRoles { account: 0, amount: 1 });
    }

    #[test]
    fn test_detect_missing_reports_available() {
        let err = detect_columns(&cols(&["Name", "Phone"])).unwrap_err();
        match err {
            ConfigError::ColumnsNotFound { available } => {
                assert_eq!(available, cols(&["Name", "Phone"]));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_table_rejects_unknown_extension() {
        let err = read_table(Path::new("contracts.txt")).unwrap_err();
        assert!(matches!(err, TableError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_wide_rows_are_truncated_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("error_log.txt");
        let log = crate::error_log::ErrorLog::new(&log_path);

        let subscriber = tracing_subscriber::registry().with(log.layer());
        let table = tracing::subscriber::with_default(subscriber, || {
            Table::new(
                cols(&["Account", "Amount"]),
                vec![
                    vec!["111".into(), "10".into()],
                    vec!["222".into(), "20".into(), "stray".into()],
                ],
            )
        });

        assert_eq!(table.rows[1], cols(&["222", "20"]));
        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("Row is wider than the header"));
        assert!(contents.contains("row=1"));
    }

    #[test]
    fn test_table_pads_short_rows() {
        let table = Table::new(cols(&["a", "b"]), vec![vec!["1".into()]]);
        assert_eq!(table.rows[0], vec!["1".to_string(), String::new()]);
    }
}
