//! Integration tests for portal-reconcile
//!
//! The portal is replaced by an in-memory provider; everything else (input
//! reading, chunking, checkpoints, merge and final artifacts) runs for real
//! against a temporary directory.

use ::arrow::array::{Array, AsArray, Float64Array};
use ::parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use async_trait::async_trait;
use clap::Parser;
use portal_reconcile::config::{CliArgs, ReconcileConfig};
use portal_reconcile::error::{ConfigError, FetchError, FetchResult, ReconcileError};
use portal_reconcile::fetch::{FetchSession, SessionProvider};
use portal_reconcile::reconcile::BatchOrchestrator;
use portal_reconcile::Classification;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

/// Portal stub with fixed answers; unknown accounts always fail
#[derive(Clone, Default)]
struct StubPortal {
    amounts: HashMap<String, f64>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl StubPortal {
    fn new(amounts: &[(&str, f64)]) -> Self {
        Self {
            amounts: amounts.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            calls: Arc::default(),
        }
    }

    fn calls_for(&self, account: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.as_str() == account)
            .count()
    }
}

struct StubSession {
    portal: StubPortal,
}

#[async_trait]
impl SessionProvider for StubPortal {
    type Session = StubSession;

    async fn create(&self) -> FetchResult<StubSession> {
        Ok(StubSession {
            portal: self.clone(),
        })
    }
}

#[async_trait]
impl FetchSession for StubSession {
    async fn fetch_value(&mut self, account: &str) -> FetchResult<Option<f64>> {
        self.portal.calls.lock().unwrap().push(account.to_string());
        match self.portal.amounts.get(account) {
            Some(amount) => Ok(Some(*amount)),
            None => Err(FetchError::Status {
                status: 503,
                account: account.to_string(),
            }),
        }
    }

    fn destroy(&mut self) {}
}

fn config_for(input: &Path, out: &Path) -> ReconcileConfig {
    let log = out.join("error_log.txt");
    let args = CliArgs::parse_from([
        "portal-reconcile",
        input.to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
        "--log-file",
        log.to_str().unwrap(),
        "--workers",
        "3",
        "--retries",
        "2",
        "--wait",
        "2",
        "--retry-sleep-min",
        "0",
        "--retry-sleep-max",
        "0",
        "--min-chunk-size",
        "5",
        "--chunk-divisor",
        "10",
        "--quiet",
    ]);
    ReconcileConfig::from_args(args).unwrap()
}

const LEDGER: &str = "\u{feff}Name,رقم الحساب,مبلغ المديونية
A,111,100
B,٢٢٢,100
C,333,100
D,444,\"1,000\"
E,n/a,10
F,555,200
G,666,50
";

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_end_to_end_reconciliation() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("contracts.csv");
    let out = dir.path().join("results");
    fs::write(&input, LEDGER).unwrap();

    let portal = StubPortal::new(&[
        ("111", 0.0),
        ("222", 50.0),
        ("444", 1000.0),
        ("555", 200.0),
        ("666", 20.0),
    ]);
    let orchestrator = BatchOrchestrator::new(config_for(&input, &out), portal.clone());
    let summary = orchestrator.run().await.unwrap();

    assert_eq!(summary.total_rows, 7);
    assert_eq!(summary.chunk_size, 5);
    assert_eq!(summary.chunk_count, 2);

    let names: Vec<&str> = summary
        .report
        .rows
        .iter()
        .map(|r| r.cells[0].as_str())
        .collect();
    assert_eq!(names, vec!["A", "B", "C", "D", "E", "F", "G"]);

    let classes: Vec<Classification> = summary
        .report
        .rows
        .iter()
        .map(|r| r.classification)
        .collect();
    assert_eq!(
        classes,
        vec![
            Classification::ZeroedOut,
            Classification::PartiallyPaid,
            Classification::FetchFailed,
            Classification::Unpaid,
            Classification::FetchFailed,
            Classification::Unpaid,
            Classification::PartiallyPaid,
        ]
    );
    assert_eq!(summary.report.rows[2].fetched, None);
    assert_eq!(summary.report.rows[6].fetched, Some(20.0));

    // Bounded retries, and no fetch at all for a record without digits
    assert_eq!(portal.calls_for("333"), 2);
    assert_eq!(portal.calls_for("222"), 1);
    assert_eq!(portal.calls.lock().unwrap().len(), 7);

    // Checkpoints for both chunks
    assert!(out.join("contracts_results_part1.parquet").is_file());
    assert!(out.join("contracts_results_part2.parquet").is_file());

    // Final artifacts
    let final_parquet = out.join("contracts_results_final.parquet");
    let final_csv = out.join("contracts_results_final.csv");
    assert_eq!(summary.artifacts, vec![final_parquet.clone(), final_csv.clone()]);

    let mut reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&final_parquet).unwrap())
        .unwrap()
        .build()
        .unwrap();
    let batch = reader.next().unwrap().unwrap();
    assert_eq!(batch.num_rows(), 7);
    assert_eq!(batch.num_columns(), 5);
    let fetched = batch
        .column(3)
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    assert_eq!(fetched.value(0), 0.0);
    assert!(fetched.is_null(2));
    let results = batch.column(4).as_string::<i32>();
    assert_eq!(results.value(1), "partially paid");

    let bytes = fs::read(&final_csv).unwrap();
    assert!(bytes.starts_with(b"\xEF\xBB\xBF"));
    let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 8);
    assert_eq!(lines[0], "Name,رقم الحساب,مبلغ المديونية,Fetched Amount,Result");
    assert_eq!(lines[1], "A,111,100,0,zeroed out");
    assert_eq!(lines[3], "C,333,100,,fetch failed");
    assert_eq!(lines[4], "D,444,\"1,000\",1000,unpaid");
}

#[tokio::test]
async fn test_empty_ledger_is_a_no_op() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("contracts.csv");
    let out = dir.path().join("results");
    fs::write(&input, "Account,Amount\n").unwrap();

    let portal = StubPortal::new(&[]);
    let orchestrator = BatchOrchestrator::new(config_for(&input, &out), portal.clone());
    let summary = orchestrator.run().await.unwrap();

    assert_eq!(summary.total_rows, 0);
    assert_eq!(summary.chunk_count, 0);
    assert!(summary.artifacts.is_empty());
    assert!(summary.report.is_empty());
    assert!(portal.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_columns_fail_before_fetching() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("contracts.csv");
    let out = dir.path().join("results");
    fs::write(&input, "Name,Notes\nA,x\n").unwrap();

    let portal = StubPortal::new(&[]);
    let orchestrator = BatchOrchestrator::new(config_for(&input, &out), portal.clone());
    let err = orchestrator.run().await.unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::Config(ConfigError::ColumnsNotFound { .. })
    ));
    assert!(portal.calls.lock().unwrap().is_empty());
    assert!(!out.exists());
}

#[tokio::test]
async fn test_missing_input_file() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("absent.csv");
    let out = dir.path().join("results");

    let orchestrator = BatchOrchestrator::new(config_for(&input, &out), StubPortal::new(&[]));
    let err = orchestrator.run().await.unwrap_err();

    assert!(matches!(err, ReconcileError::Table(_)));
}

#[tokio::test]
async fn test_unwritable_output_still_returns_report() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("contracts.csv");
    fs::write(&input, LEDGER).unwrap();

    // A regular file where the output directory should be
    let out = dir.path().join("results");
    fs::write(&out, "not a directory").unwrap();

    let portal = StubPortal::new(&[("111", 0.0), ("222", 50.0)]);
    let orchestrator = BatchOrchestrator::new(config_for(&input, &out), portal);
    let summary = orchestrator.run().await.unwrap();

    assert_eq!(summary.report.len(), 7);
    assert_eq!(summary.chunk_count, 2);
    assert!(summary.artifacts.is_empty());
    assert_eq!(summary.report.rows[0].classification, Classification::ZeroedOut);
    assert_eq!(summary.report.rows[1].classification, Classification::PartiallyPaid);
    assert!(out.is_file());
}
