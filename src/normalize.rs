//! Value normalization for locale-mixed ledger input
//!
//! Ledger files mix Arabic-Indic and ASCII digits, thousands separators,
//! currency suffixes and stray whitespace. These functions never fail: bad
//! input resolves to a sentinel (`None` for accounts, `0.0` for amounts) and
//! the downstream classification depends on exactly that behavior.

use tracing::warn;

/// Map Arabic-Indic digits and separators to their ASCII equivalents
fn to_ascii(ch: char) -> char {
    match ch {
        '\u{0660}'..='\u{0669}' => {
            let offset = ch as u32 - 0x0660;
            char::from_digit(offset, 10).unwrap_or(ch)
        }
        // Arabic decimal separator
        '\u{066B}' => '.',
        // Arabic thousands separator
        '\u{066C}' => ',',
        _ => ch,
    }
}

/// Normalize an account identifier to its ASCII digit subsequence
///
/// Returns `None` when no digit survives normalization.
pub fn normalize_account(raw: &str) -> Option<String> {
    let digits: String = raw
        .chars()
        .map(to_ascii)
        .filter(char::is_ascii_digit)
        .collect();

    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// Parse a ledger amount, defaulting to `0.0` on anything unparseable
///
/// Keeps ASCII digits and the first decimal point; later points and every
/// other character are dropped. The result is therefore never negative.
pub fn parse_amount(raw: &str) -> f64 {
    let mut clean = String::with_capacity(raw.len());
    let mut dot_seen = false;

    for ch in raw.trim().chars().map(to_ascii) {
        if ch.is_ascii_digit() {
            clean.push(ch);
        } else if ch == '.' && !dot_seen {
            clean.push('.');
            dot_seen = true;
        }
    }

    if clean.is_empty() || clean == "." {
        return 0.0;
    }

    match clean.parse::<f64>() {
        Ok(value) => value,
        Err(e) => {
            warn!(input = raw, error = %e, "Failed to parse amount, using 0");
            0.0
        }
    }
}

/// Render a float cell the way a ledger author typed it
///
/// Whole numbers lose their `.0` suffix so that numeric identifier columns
/// do not pick up an extra digit during account normalization.
pub fn format_cell_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
