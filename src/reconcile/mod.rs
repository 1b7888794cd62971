//! Concurrent reconciliation engine
//!
//! ```text
//!   BatchOrchestrator ── plan_chunks ──▶ chunk 1 ─▶ chunk 2 ─▶ ... ─▶ chunk N   (sequential)
//!                                          │
//!                                          ▼
//!                              ┌───────────────────────┐
//!                              │    ChunkProcessor     │
//!                              │  JoinSet + Semaphore  │
//!                              └───────────┬───────────┘
//!             ┌────────────────────────────┼────────────────────────────┐
//!             ▼                            ▼                            ▼
//!      fetch_with_retry             fetch_with_retry             fetch_with_retry
//!      (own session)                (own session)                (own session)
//!             │                            │                            │
//!             └──────── slot-indexed results, ProgressState ────────────┘
//!                                          │
//!                                          ▼
//!                      checkpoint part N ─▶ merge ─▶ final Parquet + CSV
//! ```

pub mod batch;
pub mod chunk;

use crate::classify::{Classification, FetchOutcome};
use crate::normalize::parse_amount;
use crate::report::{Report, ReportRow};
use crate::table::{ColumnRoles, Table};

pub use batch::{plan_chunks, BatchOrchestrator, BatchSummary, ChunkPlan};
pub use chunk::{Checkpoints, ChunkProcessor};

/// One ledger row as read from the input
#[derive(Debug, Clone, PartialEq)]
pub struct AccountRecord {
    /// Zero-based position in the input table
    pub row_index: usize,

    /// Raw account cell
    pub account_raw: String,

    /// Raw amount cell
    pub amount_raw: String,

    /// Expected amount parsed from `amount_raw`
    pub expected: f64,

    /// Every original cell, in column order
    pub cells: Vec<String>,
}

impl AccountRecord {
    /// Build a record from one table row
    pub fn new(row_index: usize, cells: Vec<String>, roles: ColumnRoles) -> Self {
        let account_raw = cells.get(roles.account).cloned().unwrap_or_default();
        let amount_raw = cells.get(roles.amount).cloned().unwrap_or_default();
        let expected = parse_amount(&amount_raw);

        Self {
            row_index,
            account_raw,
            amount_raw,
            expected,
            cells,
        }
    }

    /// Build records for every row of a table
    pub fn from_table(table: Table, roles: ColumnRoles) -> Vec<Self> {
        table
            .rows
            .into_iter()
            .enumerate()
            .map(|(row_index, cells)| Self::new(row_index, cells, roles))
            .collect()
    }
}

/// A record with its terminal fetch outcome and classification
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRow {
    pub record: AccountRecord,
    pub outcome: FetchOutcome,
    pub classification: Classification,
}

impl ReconciledRow {
    /// Convert into a report row
    pub fn into_report_row(self) -> ReportRow {
        ReportRow {
            cells: self.record.cells,
            fetched: self.outcome.amount(),
            classification: self.classification,
        }
    }
}

/// Order-preserving result of one chunk
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkOutput {
    /// One-based chunk sequence number
    pub chunk_id: usize,

    /// Reconciled rows, in input order
    pub rows: Vec<ReconciledRow>,
}

impl ChunkOutput {
    /// Convert into a report with the given input columns
    pub fn into_report(self, columns: Vec<String>) -> Report {
        Report {
            columns,
            rows: self
                .rows
                .into_iter()
                .map(ReconciledRow::into_report_row)
                .collect(),
        }
    }
}
