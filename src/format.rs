//! Numeric display formatting shared by chart labels and CLI output.
//!
//! Every user-visible number goes through one of these helpers so metrics,
//! axis ticks, and legend bounds read the same everywhere.

/// Model metrics (r², RMSE, AIC, ...) with fixed four-decimal precision.
pub fn metric(value: f64) -> String {
    if !value.is_finite() {
        return "n/a".to_string();
    }
    format!("{value:.4}")
}

/// Coefficients and importance scores; same precision as metrics.
pub fn coefficient(value: f64) -> String {
    metric(value)
}

/// Compact form for axis ticks: whole numbers bare, small values with
/// two decimals, large ones with one.
pub fn axis_tick(value: f64) -> String {
    if !value.is_finite() {
        return "n/a".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else if value.abs() >= 100.0 {
        format!("{value:.1}")
    } else {
        format!("{value:.2}")
    }
}

/// Legend bucket bounds as grouped integers, e.g. `1500` -> "1,500".
pub fn legend_bound(value: f64) -> String {
    if !value.is_finite() {
        return "n/a".to_string();
    }
    group_thousands(value.round() as i64)
}

fn group_thousands(value: i64) -> String {
    let negative = value < 0;
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    let offset = digits.len() % 3;
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (idx + 3 - offset) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if negative {
        format!("-{grouped}")
    } else {
        grouped
    }
}
