//! portal-reconcile - Concurrent Payment Portal Reconciliation
//!
//! Reconciles a ledger of accounts and expected amounts against the amounts
//! a remote payment portal reports for each account, and classifies every
//! account as fetch failed, zeroed out, unpaid or partially paid.
//!
//! # Features
//!
//! - **Bounded Concurrency**: Each chunk runs on a tokio worker pool capped
//!   by a semaphore, so the portal never sees more than `--workers` sessions.
//!
//! - **Isolated Retries**: Every attempt gets a fresh session with a hard
//!   timeout, and the session is torn down on every exit path.
//!
//! - **Order Preserving**: Results are collected in completion order and
//!   placed back by slot, so output rows line up with input rows.
//!
//! - **Crash Tolerant**: Each chunk is checkpointed to Parquet before the
//!   next one starts; final results are written as Parquet and CSV.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │            Ledger (Excel, CSV or Parquet input)                 │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ detect columns, parse amounts
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Batch Orchestrator                          │
//! │          chunk 1 ──▶ chunk 2 ──▶ ... ──▶ chunk N                │
//! │                         │                                       │
//! │                         ▼                                       │
//! │  ┌───────────────────────────────────────────────────────┐      │
//! │  │                  Chunk Processor                      │      │
//! │  │  ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌─────────┐   │      │
//! │  │  │ fetch 1 │  │ fetch 2 │  │ fetch 3 │  │ fetch N │   │      │
//! │  │  │ session │  │ session │  │ session │  │ session │   │      │
//! │  │  └────┬────┘  └────┬────┘  └────┬────┘  └────┬────┘   │      │
//! │  │       └────────────┴─────┬──────┴────────────┘        │      │
//! │  │                          ▼                            │      │
//! │  │              slot-indexed results + ETA               │      │
//! │  └──────────────────────────┬────────────────────────────┘      │
//! │                             ▼                                   │
//! │            checkpoint <stem>_results_partN.parquet              │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ merge
//!                               ▼
//!              ┌──────────────────────────────────┐
//!              │ <stem>_results_final.parquet     │
//!              │ <stem>_results_final.csv         │
//!              └──────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Reconcile with defaults (contracts.xlsx, 5 workers)
//! portal-reconcile
//!
//! # Larger pool, shorter wait, custom output directory
//! portal-reconcile ledger.parquet -w 10 --wait 8 -o out/
//! ```

pub mod classify;
pub mod config;
pub mod error;
pub mod error_log;
pub mod fetch;
pub mod normalize;
pub mod progress;
pub mod reconcile;
pub mod report;
pub mod table;

pub use classify::{classify, Classification, FetchOutcome};
pub use config::{CliArgs, PortalConfig, ReconcileConfig};
pub use error::{ReconcileError, Result};
pub use fetch::{fetch_with_retry, FetchSession, HttpPortal, RetryPolicy, SessionProvider};
pub use normalize::{normalize_account, parse_amount};
pub use reconcile::{BatchOrchestrator, BatchSummary};
