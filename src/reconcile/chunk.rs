//! Chunk processor - bounded worker pool over one chunk of records
//!
//! Every record with a usable account id becomes one task on a `JoinSet`;
//! a `Semaphore` caps how many of them hold a portal session at once.
//! Results are consumed in completion order and written back by slot, so the
//! output is always in input order regardless of which fetch finished first.

use crate::classify::{classify, FetchOutcome};
use crate::error::{PersistError, PersistResult};
use crate::fetch::{fetch_with_retry, RetryPolicy, SessionProvider};
use crate::normalize::normalize_account;
use crate::progress::{ProgressReporter, ProgressState};
use crate::reconcile::{AccountRecord, ChunkOutput, ReconciledRow};
use crate::report::parquet::write_parquet;
use crate::report::Report;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Where and how chunk checkpoints are written
#[derive(Debug, Clone)]
pub struct Checkpoints {
    dir: PathBuf,
    stem: String,
    columns: Vec<String>,
}

impl Checkpoints {
    /// Checkpoints named `<stem>_results_part<N>.parquet` inside `dir`
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
            columns,
        }
    }

    /// Checkpoint path for a chunk
    pub fn path_for(&self, chunk_id: usize) -> PathBuf {
        self.dir
            .join(format!("{}_results_part{}.parquet", self.stem, chunk_id))
    }

    /// Write a chunk's output; failures are logged and swallowed
    pub async fn persist(&self, output: &ChunkOutput) -> Option<PathBuf> {
        let path = self.path_for(output.chunk_id);
        let report = output.clone().into_report(self.columns.clone());

        match write_blocking(report, path.clone()).await {
            Ok(()) => {
                info!(chunk = output.chunk_id, path = %path.display(), "Wrote chunk checkpoint");
                Some(path)
            }
            Err(e) => {
                warn!(
                    chunk = output.chunk_id,
                    path = %path.display(),
                    error = %e,
                    "Failed to write chunk checkpoint"
                );
                None
            }
        }
    }
}

/// Run the Parquet writer off the async workers
async fn write_blocking(report: Report, path: PathBuf) -> PersistResult<()> {
    tokio::task::spawn_blocking(move || write_parquet(&report, &path))
        .await
        .map_err(|e| PersistError::Task(e.to_string()))?
}

/// Runs one chunk of records through the worker pool
pub struct ChunkProcessor<P: SessionProvider> {
    provider: Arc<P>,
    policy: Arc<RetryPolicy>,
    max_workers: usize,
    reporter: Arc<ProgressReporter>,
    checkpoints: Option<Checkpoints>,
}

impl<P: SessionProvider> ChunkProcessor<P> {
    /// Create a processor with at most `max_workers` concurrent fetches
    pub fn new(
        provider: Arc<P>,
        policy: RetryPolicy,
        max_workers: usize,
        reporter: Arc<ProgressReporter>,
    ) -> Self {
        Self {
            provider,
            policy: Arc::new(policy),
            max_workers: max_workers.max(1),
            reporter,
            checkpoints: None,
        }
    }

    /// Persist every processed chunk as a checkpoint
    pub fn with_checkpoints(mut self, checkpoints: Checkpoints) -> Self {
        self.checkpoints = Some(checkpoints);
        self
    }

    /// Checkpoint settings, if enabled
    pub fn checkpoints(&self) -> Option<&Checkpoints> {
        self.checkpoints.as_ref()
    }

    /// Process one chunk; output has the same length and order as `records`
    pub async fn process_chunk(
        &self,
        chunk_id: usize,
        records: Vec<AccountRecord>,
        progress: &ProgressState,
    ) -> ChunkOutput {
        let mut outcomes: Vec<Option<FetchOutcome>> = vec![None; records.len()];
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut tasks = JoinSet::new();

        for (slot, record) in records.iter().enumerate() {
            let Some(account) = normalize_account(&record.account_raw) else {
                debug!(
                    chunk = chunk_id,
                    row = record.row_index,
                    raw = %record.account_raw,
                    "No account id, skipping fetch"
                );
                outcomes[slot] = Some(FetchOutcome::NotFound);
                self.reporter.report(chunk_id, &progress.record_completion());
                continue;
            };

            let provider = Arc::clone(&self.provider);
            let policy = Arc::clone(&self.policy);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                // Held until the fetch (all of its attempts) resolves
                let _permit = semaphore.acquire_owned().await;
                let outcome = fetch_with_retry(provider.as_ref(), &account, &policy).await;
                (slot, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, outcome)) => outcomes[slot] = Some(outcome),
                Err(e) => error!(chunk = chunk_id, error = %e, "Fetch task failed"),
            }
            self.reporter.report(chunk_id, &progress.record_completion());
        }

        let rows = records
            .into_iter()
            .zip(outcomes)
            .map(|(record, outcome)| {
                // Only a failed task leaves its slot empty
                let outcome = outcome.unwrap_or(FetchOutcome::NotFound);
                let classification = classify(record.expected, outcome);
                ReconciledRow {
                    record,
                    outcome,
                    classification,
                }
            })
            .collect();

        let output = ChunkOutput { chunk_id, rows };

        if let Some(checkpoints) = &self.checkpoints {
            checkpoints.persist(&output).await;
        }

        output
    }
}
