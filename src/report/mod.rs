//! Reconciliation reports
//!
//! A [`Report`] is the input table's columns plus the fetched amount and the
//! classification of every row. Reports are written per chunk as checkpoints
//! and once more, merged, as the final result.
//!
//! # Module Structure
//!
//! - `csv`: CSV writer (UTF-8 with BOM, for spreadsheet tools)
//! - `parquet`: Parquet writer (typed amount column, ZSTD)

pub mod csv;
pub mod parquet;

use crate::classify::Classification;
use crate::error::MergeError;
use std::collections::HashMap;

/// Column holding the amount fetched from the portal
pub const FETCHED_AMOUNT_COLUMN: &str = "Fetched Amount";

/// Column holding the classification label
pub const RESULT_COLUMN: &str = "Result";

/// One reconciled row
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    /// Original cells, aligned with `Report::columns`
    pub cells: Vec<String>,

    /// Amount fetched from the portal, if any
    pub fetched: Option<f64>,

    /// Payment status
    pub classification: Classification,
}

/// Reconciled rows with the original column names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    /// Original input columns (the two result columns are implied)
    pub columns: Vec<String>,
    pub rows: Vec<ReportRow>,
}

impl Report {
    /// Create an empty report with the given input columns
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the report has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Full header: input columns followed by the result columns
    pub fn header(&self) -> Vec<String> {
        let mut header = self.columns.clone();
        header.push(FETCHED_AMOUNT_COLUMN.to_string());
        header.push(RESULT_COLUMN.to_string());
        header
    }

    /// Move another chunk's rows into this report, requiring identical columns
    ///
    /// On mismatch `other` is left untouched so the caller can recover.
    pub fn append(&mut self, chunk_id: usize, other: &mut Report) -> Result<(), MergeError> {
        if other.columns != self.columns {
            return Err(MergeError::ColumnMismatch {
                chunk_id,
                expected: self.columns.clone(),
                found: other.columns.clone(),
            });
        }
        self.rows.append(&mut other.rows);
        Ok(())
    }

    /// Append another chunk's rows, matching cells by column name
    ///
    /// Columns this report lacks are dropped; columns the other report lacks
    /// are left empty.
    pub fn append_aligned(&mut self, other: Report) {
        let positions: HashMap<&str, usize> = other
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        let mapping: Vec<Option<usize>> = self
            .columns
            .iter()
            .map(|name| positions.get(name.as_str()).copied())
            .collect();

        for row in other.rows {
            let cells = mapping
                .iter()
                .map(|slot| {
                    slot.and_then(|i| row.cells.get(i).cloned())
                        .unwrap_or_default()
                })
                .collect();
            self.rows.push(ReportRow {
                cells,
                fetched: row.fetched,
                classification: row.classification,
            });
        }
    }

    /// Row count per classification, in report order
    pub fn tally(&self) -> Vec<(Classification, usize)> {
        Classification::ALL
            .iter()
            .map(|c| {
                let count = self.rows.iter().filter(|r| r.classification == *c).count();
                (*c, count)
            })
            .collect()
    }
}

/// Render a fetched amount for text output
pub fn format_amount(amount: Option<f64>) -> String {
    amount.map(|v| v.to_string()).unwrap_or_default()
}
