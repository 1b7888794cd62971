//! Configuration types for portal-reconcile
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - Portal routing settings for the HTTP fetcher
//!
//! Configuration is parsed and validated once at startup and is read-only
//! afterwards; every component receives it through an `Arc`.

use crate::error::ConfigError;
use crate::fetch::retry::RetryPolicy;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Maximum reasonable worker count (each worker holds a live portal session)
const MAX_WORKERS: usize = 64;

/// Placeholder substituted with the normalized account id
pub const ACCOUNT_PLACEHOLDER: &str = "{account}";

/// Default route for accounts starting with the quick-pay prefix
pub const DEFAULT_QUICKPAY_URL: &str = "https://app.sa.zain.com/ar/quickpay?account={account}";

/// Default route for every other account
pub const DEFAULT_CONTRACT_URL: &str =
    "https://app.sa.zain.com/ar/contract-payment?contract={account}";

/// Reconcile a ledger of expected amounts against a billing portal
#[derive(Parser, Debug, Clone)]
#[command(
    name = "portal-reconcile",
    version,
    about = "Reconcile a ledger of expected amounts against a billing portal",
    long_about = "Reads a ledger (Excel, CSV or Parquet) with an account column and an amount column,\n\
                  fetches the live amount for every account from the billing portal with\n\
                  bounded concurrency and retries, and classifies each account as\n\
                  fetch failed, zeroed out, unpaid or partially paid.\n\n\
                  Work is split into chunks that run one after another; each chunk is\n\
                  checkpointed to the output directory as soon as it completes.",
    after_help = "EXAMPLES:\n    \
        portal-reconcile contracts.xlsx\n    \
        portal-reconcile ledger.parquet -w 8 -o out\n    \
        portal-reconcile contracts.xlsx --retries 5 --wait 30 -v"
)]
pub struct CliArgs {
    /// Ledger file to reconcile (.xlsx, .xls, .ods, .csv or .parquet)
    #[arg(value_name = "INPUT", default_value = "contracts.xlsx")]
    pub input: PathBuf,

    /// Number of concurrent portal sessions
    #[arg(short = 'w', long, default_value = "5", value_name = "NUM")]
    pub workers: usize,

    /// Maximum seconds to wait for the amount on each attempt
    #[arg(long, default_value = "15", value_name = "SECS")]
    pub wait: u64,

    /// Attempts per account, each with a fresh session
    #[arg(long, default_value = "3", value_name = "NUM")]
    pub retries: u32,

    /// Lower bound of the random sleep between attempts (seconds)
    #[arg(long, default_value = "1.0", value_name = "SECS")]
    pub retry_sleep_min: f64,

    /// Upper bound of the random sleep between attempts (seconds)
    #[arg(long, default_value = "2.5", value_name = "SECS")]
    pub retry_sleep_max: f64,

    /// Smallest chunk size
    #[arg(long, default_value = "50", value_name = "ROWS")]
    pub min_chunk_size: usize,

    /// Approximate number of chunks the ledger is split into
    #[arg(long, default_value = "10", value_name = "NUM")]
    pub chunk_divisor: usize,

    /// Directory for chunk checkpoints and final reports
    #[arg(short = 'o', long, default_value = "results", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Append-only error log
    #[arg(long, default_value = "error_log.txt", value_name = "FILE")]
    pub log_file: PathBuf,

    /// Portal URL for quick-pay accounts
    #[arg(long, default_value = DEFAULT_QUICKPAY_URL, value_name = "URL")]
    pub quickpay_url: String,

    /// Portal URL for contract accounts
    #[arg(long, default_value = DEFAULT_CONTRACT_URL, value_name = "URL")]
    pub contract_url: String,

    /// Leading digit that routes an account to the quick-pay URL
    #[arg(long, default_value = "2", value_name = "PREFIX")]
    pub quickpay_prefix: String,

    /// Id of the page element holding the amount
    #[arg(long, default_value = "customAmount", value_name = "ID")]
    pub amount_element: String,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Portal routing and extraction settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    /// URL template for quick-pay accounts
    pub quickpay_url: String,

    /// URL template for contract accounts
    pub contract_url: String,

    /// Account prefix selecting the quick-pay template
    pub quickpay_prefix: String,

    /// Id of the element carrying the amount
    pub amount_element: String,

    /// Connect timeout for new sessions
    pub connect_timeout: Duration,
}

impl PortalConfig {
    /// Build the target URL for an account
    pub fn url_for(&self, account: &str) -> String {
        let template = if account.starts_with(&self.quickpay_prefix) {
            &self.quickpay_url
        } else {
            &self.contract_url
        };
        template.replace(ACCOUNT_PLACEHOLDER, account)
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            quickpay_url: DEFAULT_QUICKPAY_URL.to_string(),
            contract_url: DEFAULT_CONTRACT_URL.to_string(),
            quickpay_prefix: "2".to_string(),
            amount_element: "customAmount".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Ledger file
    pub input_path: PathBuf,

    /// Output directory for checkpoints and final reports
    pub output_dir: PathBuf,

    /// Error log path
    pub log_path: PathBuf,

    /// Concurrent sessions per chunk
    pub max_workers: usize,

    /// Per-account retry policy
    pub retry: RetryPolicy,

    /// Smallest chunk size
    pub min_chunk_size: usize,

    /// Target number of chunks
    pub chunk_divisor: usize,

    /// Portal routing
    pub portal: PortalConfig,

    /// Show progress output
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl ReconcileConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        // Validate worker count
        if args.workers == 0 || args.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: args.workers,
                max: MAX_WORKERS,
            });
        }

        if args.retries == 0 {
            return Err(ConfigError::InvalidRetryCount {
                count: args.retries,
            });
        }

        if args.wait == 0 {
            return Err(ConfigError::InvalidWait { secs: args.wait });
        }

        let (min, max) = (args.retry_sleep_min, args.retry_sleep_max);
        if !(min.is_finite() && max.is_finite()) || min < 0.0 || max < min {
            return Err(ConfigError::InvalidBackoff { min, max });
        }

        if args.min_chunk_size == 0 || args.chunk_divisor == 0 {
            return Err(ConfigError::InvalidChunking {
                min_chunk_size: args.min_chunk_size,
                divisor: args.chunk_divisor,
            });
        }

        for template in [&args.quickpay_url, &args.contract_url] {
            if !template.contains(ACCOUNT_PLACEHOLDER) {
                return Err(ConfigError::InvalidUrlTemplate {
                    template: template.clone(),
                });
            }
        }

        let retry = RetryPolicy {
            attempts: args.retries,
            wait: Duration::from_secs(args.wait),
            backoff_min: Duration::from_secs_f64(min),
            backoff_max: Duration::from_secs_f64(max),
        };

        Ok(Self {
            input_path: args.input,
            output_dir: args.output_dir,
            log_path: args.log_file,
            max_workers: args.workers,
            retry,
            min_chunk_size: args.min_chunk_size,
            chunk_divisor: args.chunk_divisor,
            portal: PortalConfig {
                quickpay_url: args.quickpay_url,
                contract_url: args.contract_url,
                quickpay_prefix: args.quickpay_prefix,
                amount_element: args.amount_element,
                ..PortalConfig::default()
            },
            show_progress: !args.quiet,
            verbose: args.verbose,
        })
    }

    /// File stem used to name output artifacts
    pub fn report_stem(&self) -> String {
        report_stem(&self.input_path)
    }
}

/// Derive the artifact name stem from the input path
pub fn report_stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "ledger".to_string())
}
