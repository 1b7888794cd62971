//! Batch orchestrator
//!
//! Splits a ledger into chunks, runs them one after another through a
//! [`ChunkProcessor`], merges the chunk reports and persists the final
//! result in both Parquet and CSV form.

use crate::classify::Classification;
use crate::config::ReconcileConfig;
use crate::error::{PersistError, PersistResult, Result};
use crate::fetch::SessionProvider;
use crate::progress::{print_header, ProgressReporter, ProgressState};
use crate::reconcile::{AccountRecord, Checkpoints, ChunkProcessor};
use crate::report::{csv::write_csv, parquet::write_parquet, Report};
use crate::table::{detect_columns, read_table, Table};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// How a ledger is split into chunks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    /// Rows in the ledger
    pub total_rows: usize,

    /// Rows per chunk (the last chunk may be shorter)
    pub chunk_size: usize,

    /// Contiguous row ranges, one per chunk
    pub ranges: Vec<Range<usize>>,
}

impl ChunkPlan {
    /// Number of chunks
    pub fn chunk_count(&self) -> usize {
        self.ranges.len()
    }
}

/// Split `total_rows` into chunks of `max(min_chunk_size, total_rows / divisor)`
pub fn plan_chunks(total_rows: usize, min_chunk_size: usize, divisor: usize) -> ChunkPlan {
    let chunk_size = (total_rows / divisor.max(1)).max(min_chunk_size).max(1);
    let ranges = (0..total_rows)
        .step_by(chunk_size)
        .map(|start| start..(start + chunk_size).min(total_rows))
        .collect();

    ChunkPlan {
        total_rows,
        chunk_size,
        ranges,
    }
}

/// Outcome of a whole batch
#[derive(Debug)]
pub struct BatchSummary {
    pub total_rows: usize,
    pub chunk_size: usize,
    pub chunk_count: usize,

    /// Row count per classification
    pub tally: Vec<(Classification, usize)>,

    pub duration: Duration,

    /// Final artifacts that were written successfully
    pub artifacts: Vec<PathBuf>,

    /// Merged report, in input order
    pub report: Report,
}

/// Drives a full reconciliation run
pub struct BatchOrchestrator<P: SessionProvider> {
    config: Arc<ReconcileConfig>,
    provider: Arc<P>,
}

impl<P: SessionProvider> BatchOrchestrator<P> {
    /// Create an orchestrator for the given configuration and portal
    pub fn new(config: ReconcileConfig, provider: P) -> Self {
        Self {
            config: Arc::new(config),
            provider: Arc::new(provider),
        }
    }

    /// Read the configured input and reconcile it
    pub async fn run(&self) -> Result<BatchSummary> {
        let path = self.config.input_path.clone();
        let table = tokio::task::spawn_blocking(move || read_table(&path))
            .await
            .map_err(std::io::Error::other)??;

        self.reconcile(table).await
    }

    /// Reconcile an already loaded table
    ///
    /// Fails only on missing columns; every per-record and per-artifact
    /// failure is logged and absorbed.
    pub async fn reconcile(&self, table: Table) -> Result<BatchSummary> {
        let start = Instant::now();
        let config = &self.config;

        let roles = detect_columns(&table.columns)?;
        let columns = table.columns.clone();
        let plan = plan_chunks(table.len(), config.min_chunk_size, config.chunk_divisor);

        info!(
            input = %config.input_path.display(),
            rows = plan.total_rows,
            chunks = plan.chunk_count(),
            chunk_size = plan.chunk_size,
            workers = config.max_workers,
            "Starting reconciliation"
        );

        if plan.total_rows == 0 {
            info!("Ledger is empty, nothing to reconcile");
            return Ok(BatchSummary {
                total_rows: 0,
                chunk_size: plan.chunk_size,
                chunk_count: 0,
                tally: Report::new(columns.clone()).tally(),
                duration: start.elapsed(),
                artifacts: Vec::new(),
                report: Report::new(columns),
            });
        }

        if let Err(e) = std::fs::create_dir_all(&config.output_dir) {
            warn!(
                dir = %config.output_dir.display(),
                error = %e,
                "Failed to create output directory"
            );
        }

        if config.show_progress {
            print_header(
                &config.input_path.display().to_string(),
                plan.total_rows,
                plan.chunk_count(),
                plan.chunk_size,
                config.max_workers,
            );
        }

        let reporter = Arc::new(if config.show_progress {
            ProgressReporter::new(plan.total_rows as u64)
        } else {
            ProgressReporter::hidden()
        });
        let stem = config.report_stem();
        let processor = ChunkProcessor::new(
            Arc::clone(&self.provider),
            config.retry.clone(),
            config.max_workers,
            Arc::clone(&reporter),
        )
        .with_checkpoints(Checkpoints::new(&config.output_dir, stem.clone(), columns.clone()));

        let progress = ProgressState::new(plan.total_rows as u64);
        let mut records = AccountRecord::from_table(table, roles).into_iter();
        let mut merged = Report::new(columns.clone());

        for (index, range) in plan.ranges.iter().enumerate() {
            let chunk_id = index + 1;
            let chunk: Vec<AccountRecord> = records.by_ref().take(range.len()).collect();

            info!(
                chunk = chunk_id,
                of = plan.chunk_count(),
                rows = chunk.len(),
                "Processing chunk"
            );
            reporter.set_status(&format!("chunk {}/{}", chunk_id, plan.chunk_count()));

            let output = processor.process_chunk(chunk_id, chunk, &progress).await;
            let mut report = output.into_report(columns.clone());

            if let Err(e) = merged.append(chunk_id, &mut report) {
                warn!(error = %e, "Chunk columns differ, merging by column name");
                merged.append_aligned(report);
            }
        }

        reporter.finish("done");

        let artifacts = persist_final(&merged, &config.output_dir, &stem).await;
        let duration = start.elapsed();

        info!(
            rows = merged.len(),
            duration_secs = duration.as_secs_f64(),
            "Reconciliation complete"
        );

        Ok(BatchSummary {
            total_rows: plan.total_rows,
            chunk_size: plan.chunk_size,
            chunk_count: plan.chunk_count(),
            tally: merged.tally(),
            duration,
            artifacts,
            report: merged,
        })
    }
}

/// Final artifact paths for a stem
pub fn final_paths(output_dir: &Path, stem: &str) -> (PathBuf, PathBuf) {
    (
        output_dir.join(format!("{}_results_final.parquet", stem)),
        output_dir.join(format!("{}_results_final.csv", stem)),
    )
}

/// Write the merged report; returns the paths that were written
async fn persist_final(report: &Report, output_dir: &Path, stem: &str) -> Vec<PathBuf> {
    let (parquet_path, csv_path) = final_paths(output_dir, stem);
    let report = Arc::new(report.clone());
    let mut written = Vec::new();

    let result = {
        let report = Arc::clone(&report);
        let path = parquet_path.clone();
        run_blocking(move || write_parquet(&report, &path)).await
    };
    match result {
        Ok(()) => written.push(parquet_path),
        Err(e) => error!(path = %parquet_path.display(), error = %e, "Failed to write final Parquet report"),
    }

    let result = {
        let path = csv_path.clone();
        run_blocking(move || write_csv(&report, &path)).await
    };
    match result {
        Ok(()) => written.push(csv_path),
        Err(e) => error!(path = %csv_path.display(), error = %e, "Failed to write final CSV report"),
    }

    written
}

async fn run_blocking<F>(f: F) -> PersistResult<()>
where
    F: FnOnce() -> PersistResult<()> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PersistError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_small_ledger_uses_min_chunk() {
        let plan = plan_chunks(7, 5, 10);
        assert_eq!(plan.chunk_size, 5);
        assert_eq!(plan.ranges, vec![0..5, 5..7]);
    }

    #[test]
    fn test_plan_large_ledger_uses_divisor() {
        let plan = plan_chunks(1000, 50, 10);
        assert_eq!(plan.chunk_size, 100);
        assert_eq!(plan.chunk_count(), 10);
        assert_eq!(plan.ranges[9], 900..1000);
    }

    #[test]
    fn test_plan_fewer_rows_than_min() {
        let plan = plan_chunks(3, 50, 10);
        assert_eq!(plan.chunk_size, 50);
        assert_eq!(plan.ranges, vec![0..3]);
    }

    #[test]
    fn test_plan_remainder_chunk() {
        let plan = plan_chunks(1005, 50, 10);
        assert_eq!(plan.chunk_size, 100);
        assert_eq!(plan.chunk_count(), 11);
        assert_eq!(plan.ranges[10], 1000..1005);
    }

    #[test]
    fn test_plan_empty() {
        let plan = plan_chunks(0, 50, 10);
        assert!(plan.ranges.is_empty());
    }

    #[test]
    fn test_plan_covers_every_row_once() {
        for total in [1usize, 49, 50, 51, 499, 500, 501, 1234, 10_007] {
            let plan = plan_chunks(total, 50, 10);
            let covered: usize = plan.ranges.iter().map(|r| r.len()).sum();
            assert_eq!(covered, total);
            assert_eq!(plan.chunk_count(), total.div_ceil(plan.chunk_size));
            for pair in plan.ranges.windows(2) {
                assert_eq!(pair[0].end, pair[1].start);
            }
        }
    }

    #[test]
    fn test_final_paths() {
        let (parquet, csv) = final_paths(Path::new("results"), "contracts");
        assert_eq!(parquet, PathBuf::from("results/contracts_results_final.parquet"));
        assert_eq!(csv, PathBuf::from("results/contracts_results_final.csv"));
    }
}
