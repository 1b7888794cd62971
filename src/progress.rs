//! Progress reporting for reconciliation runs
//!
//! [`ProgressState`] is the only counter shared by concurrent fetch tasks. It
//! is passed explicitly into each chunk and never read for control decisions;
//! [`ProgressReporter`] turns its snapshots into progress lines using
//! indicatif.

use crate::classify::Classification;
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Batch-wide completion counter
#[derive(Debug)]
pub struct ProgressState {
    completed: AtomicU64,
    total: u64,
    started_at: Instant,
}

impl ProgressState {
    /// Start tracking a batch of `total` records
    pub fn new(total: u64) -> Self {
        Self::starting_at(total, Instant::now())
    }

    /// Start tracking with an explicit start time
    pub fn starting_at(total: u64, started_at: Instant) -> Self {
        Self {
            completed: AtomicU64::new(0),
            total,
            started_at,
        }
    }

    /// Record one resolved record and return the resulting snapshot
    pub fn record_completion(&self) -> ProgressSnapshot {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        ProgressSnapshot::compute(completed, self.total, self.started_at.elapsed())
    }

    /// Records resolved so far
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Records in the batch
    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Point-in-time view of batch progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub completed: u64,
    pub total: u64,
    pub remaining: u64,
    pub elapsed: Duration,
    pub average: Duration,
    pub eta: Duration,
}

impl ProgressSnapshot {
    /// Derive remaining count and ETA from a completion count
    pub fn compute(completed: u64, total: u64, elapsed: Duration) -> Self {
        let average = if completed > 0 {
            elapsed.div_f64(completed as f64)
        } else {
            Duration::ZERO
        };
        let remaining = total.saturating_sub(completed);
        let eta = average.mul_f64(remaining as f64);

        Self {
            completed,
            total,
            remaining,
            elapsed,
            average,
            eta,
        }
    }

    /// Render as a single progress line
    pub fn line(&self, chunk_id: usize) -> String {
        format!(
            "[Chunk {}] done: {}/{} | remaining: {} | ETA ~ {}s",
            chunk_id,
            format_number(self.completed),
            format_number(self.total),
            format_number(self.remaining),
            self.eta.as_secs()
        )
    }
}

/// Progress reporter that displays reconciliation status
pub struct ProgressReporter {
    /// Progress bar
    bar: ProgressBar,

    /// Log progress lines at info level when the bar cannot draw
    log_lines: bool,
}

impl ProgressReporter {
    /// Create a visible reporter for `total` records
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("Invalid progress template")
                .progress_chars("=>-"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            bar,
            log_lines: true,
        }
    }

    /// Create a reporter that draws nothing
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            log_lines: false,
        }
    }

    /// Emit a progress line for a completed record
    pub fn report(&self, chunk_id: usize, snapshot: &ProgressSnapshot) {
        let line = snapshot.line(chunk_id);
        self.bar.set_position(snapshot.completed);

        // indicatif hides the bar when stderr is not a terminal
        if self.bar.is_hidden() {
            if self.log_lines {
                info!("{}", line);
            } else {
                debug!("{}", line);
            }
        } else {
            debug!("{}", line);
            self.bar.println(line);
        }
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Format a count with thousands separators
fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Print a header at the start of the run
pub fn print_header(input: &str, total: usize, chunks: usize, chunk_size: usize, workers: usize) {
    println!();
    println!(
        "{} {}",
        style("portal-reconcile").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Input:").bold(), input);
    println!("  {} {}", style("Accounts:").bold(), format_number(total as u64));
    println!(
        "  {} {} (~{} rows each)",
        style("Chunks:").bold(),
        chunks,
        format_number(chunk_size as u64)
    );
    println!("  {} {}", style("Workers:").bold(), workers);
    println!(
        "  {} {}",
        style("Started:").bold(),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    println!();
}

/// Print a summary of the run
pub fn print_summary(
    total: usize,
    tally: &[(Classification, usize)],
    duration: Duration,
    artifacts: &[&Path],
    log_path: &Path,
) {
    println!();
    println!("{}", style("Reconciliation Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Accounts:").bold(), format_number(total as u64));
    for (classification, count) in tally {
        let label = format!("{}:", classification);
        let label = match classification {
            Classification::FetchFailed if *count > 0 => style(label).yellow().bold(),
            _ => style(label).bold(),
        };
        println!("  {} {}", label, format_number(*count as u64));
    }
    println!(
        "  {} {:.1}s",
        style("Duration:").bold(),
        duration.as_secs_f64()
    );
    for path in artifacts {
        match std::fs::metadata(path) {
            Ok(meta) => println!(
                "  {} {} ({})",
                style("Output:").bold(),
                path.display(),
                format_size(meta.len(), BINARY)
            ),
            Err(_) => println!("  {} {}", style("Output:").bold(), path.display()),
        }
    }
    println!(
        "  {} {} (if any errors occurred)",
        style("Error log:").bold(),
        log_path.display()
    );
    println!();
}
