//! Comparison of expected ledger amounts against fetched portal amounts

use std::fmt;

/// Result of fetching one account's amount, after all retries resolved
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FetchOutcome {
    /// Amount shown by the portal
    Amount(f64),

    /// No attempt produced a value
    NotFound,
}

impl FetchOutcome {
    /// The fetched amount, if any
    pub fn amount(&self) -> Option<f64> {
        match self {
            FetchOutcome::Amount(value) => Some(*value),
            FetchOutcome::NotFound => None,
        }
    }
}

/// Payment status of one account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Classification {
    /// The portal value could not be obtained
    FetchFailed,

    /// The portal shows nothing due
    ZeroedOut,

    /// The amount due has not decreased
    Unpaid,

    /// The amount due is lower than expected
    PartiallyPaid,
}

impl Classification {
    /// All classifications in report order
    pub const ALL: [Classification; 4] = [
        Classification::FetchFailed,
        Classification::ZeroedOut,
        Classification::Unpaid,
        Classification::PartiallyPaid,
    ];

    /// Label written to the result column
    pub fn label(&self) -> &'static str {
        match self {
            Classification::FetchFailed => "fetch failed",
            Classification::ZeroedOut => "zeroed out",
            Classification::Unpaid => "unpaid",
            Classification::PartiallyPaid => "partially paid",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify an account from its expected amount and fetch outcome
///
/// A fetched amount equal to the expected one counts as unpaid.
pub fn classify(expected: f64, outcome: FetchOutcome) -> Classification {
    match outcome {
        FetchOutcome::NotFound => Classification::FetchFailed,
        FetchOutcome::Amount(value) if value == 0.0 => Classification::ZeroedOut,
        FetchOutcome::Amount(value) if value >= expected => Classification::Unpaid,
        FetchOutcome::Amount(_) => Classification::PartiallyPaid,
    }
}
