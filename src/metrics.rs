//! Pure metric utilities: PnL percentage, magnitude simplification and
//! display formatting. No state, no I/O.

use chrono::{Duration, TimeZone, Utc};

/// Magnitude suffixes used by `simplify`, largest tier saturates.
const SUFFIXES: [&str; 5] = ["", "K", "M", "B", "T"];

/// Result of a worth computation for one holding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PnLResult {
    pub pnl_percent: f64,
    pub total_cost: f64,
    pub current_worth: f64,
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage change between cost basis and current value.
///
/// Returns 0.0 when the cost basis is zero so callers never divide by zero.
pub fn percentage_pnl(cost_basis: f64, current_value: f64) -> f64 {
    if cost_basis == 0.0 {
        return 0.0;
    }
    round2((current_value - cost_basis) / cost_basis * 100.0)
}

/// Reduce a large magnitude to a human-scale (value, suffix) pair.
///
/// Divides by 1000 per tier and saturates at the largest suffix instead of
/// failing on extreme inputs.
pub fn simplify(value: f64) -> (f64, &'static str) {
    let mut scaled = value;
    let mut magnitude = 0;
    while scaled.abs() >= 1000.0 && magnitude < SUFFIXES.len() - 1 {
        scaled /= 1000.0;
        magnitude += 1;
    }
    (scaled, SUFFIXES[magnitude])
}

/// Render a simplified magnitude with trailing zeros trimmed: `1.5M`, `950`.
pub fn format_compact(value: f64) -> String {
    let (scaled, suffix) = simplify(value);
    let rendered = format!("{:.2}", scaled);
    let rendered = rendered.trim_end_matches('0').trim_end_matches('.');
    format!("{}{}", rendered, suffix)
}

/// Render a price with 4 significant fractional digits. Sub-unit prices
/// with leading fractional zeros compress the zero run into a subscript
/// count: 0.00001234 becomes `0.0₄1234`.
pub fn format_price(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return "0".to_string();
    }

    let sign = if value < 0.0 { "-" } else { "" };
    let abs = value.abs();

    if abs >= 0.1 {
        let rendered = format!("{:.4}", abs);
        let rendered = rendered.trim_end_matches('0').trim_end_matches('.');
        return format!("{}{}", sign, rendered);
    }

    // Count zeros between the decimal point and the first significant digit,
    // then round the significand to 4 digits.
    let mut zeros = 0usize;
    let mut scaled = abs;
    while scaled < 0.1 && zeros < 18 {
        scaled *= 10.0;
        zeros += 1;
    }

    let rendered = format!("{:.4}", scaled);
    let digits = match rendered.strip_prefix("0.") {
        Some(frac) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() { "1".to_string() } else { frac.to_string() }
        }
        // Rounding carried into the units place: the value is ~10^-zeros.
        None => {
            zeros = zeros.saturating_sub(1);
            "1".to_string()
        }
    };

    if zeros > 0 {
        format!("{}0.0{}{}", sign, subscript(zeros), digits)
    } else {
        format!("{}0.{}", sign, digits)
    }
}

/// Worth of a holding: total cost is the supplied cost basis, current worth
/// is unit price times quantity, PnL relates the two.
pub fn worth(cost_basis: f64, unit_price: f64, quantity: f64) -> PnLResult {
    let current_worth = round2(unit_price * quantity);
    let total_cost = round2(cost_basis);
    PnLResult {
        pnl_percent: percentage_pnl(total_cost, current_worth),
        total_cost,
        current_worth,
    }
}

/// Format a unix timestamp as `YYYY-MM-DD HH:MM:SS` in MSK (fixed UTC+3).
pub fn format_datetime_msk(timestamp: i64) -> String {
    match Utc.timestamp_opt(timestamp, 0).single() {
        Some(dt) => (dt + Duration::hours(3)).format("%Y-%m-%d %H:%M:%S").to_string(),
        None => timestamp.to_string(),
    }
}

/// Map a count to unicode subscript digits (4 -> ₄, 12 -> ₁₂).
fn subscript(count: usize) -> String {
    const DIGITS: [char; 10] = ['₀', '₁', '₂', '₃', '₄', '₅', '₆', '₇', '₈', '₉'];
    count
        .to_string()
        .chars()
        .filter_map(|c| c.to_digit(10).map(|d| DIGITS[d as usize]))
        .collect()
}
