//! Display formatting for prices, percentages and large amounts

/// Formats a USD price with precision scaled to its magnitude
///
/// Prices of 1000 and above drop decimals and gain thousands separators;
/// sub-cent prices keep six decimals so small caps stay readable.
pub fn format_price(price: f64) -> String {
    if !price.is_finite() || price == 0.0 {
        return "$0.00".to_string();
    }

    let sign = if price < 0.0 { "-" } else { "" };
    let abs = price.abs();

    // Tier by the value as the next tier down would print it
    let digits = if round_to(abs, 2) >= 1000.0 {
        group_thousands(&format!("{:.0}", abs.round()))
    } else if round_to(abs, 4) >= 1.0 {
        format!("{:.2}", abs)
    } else if round_to(abs, 6) >= 0.01 {
        format!("{:.4}", abs)
    } else {
        format!("{:.6}", abs)
    };

    format!("{}${}", sign, digits)
}

/// Formats a percent change with two decimals
pub fn format_percent(change: f64) -> String {
    if !change.is_finite() {
        return "0.00%".to_string();
    }
    format!("{:.2}%", change)
}

/// Formats market cap or volume compactly (`1.50B`, `320.00M`)
pub fn format_compact(value: f64) -> String {
    if !value.is_finite() {
        return "0.00".to_string();
    }

    let abs = value.abs();
    let (unit, suffix) = COMPACT_UNITS
        .iter()
        .copied()
        .find(|(unit, _)| round_to(abs / unit, 2) < 1000.0)
        .unwrap_or(COMPACT_UNITS[COMPACT_UNITS.len() - 1]);

    format!("{:.2}{}", value / unit, suffix)
}

/// Compact suffixes, smallest first
const COMPACT_UNITS: [(f64, &str); 5] = [
    (1.0, ""),
    (1e3, "K"),
    (1e6, "M"),
    (1e9, "B"),
    (1e12, "T"),
];

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Inserts `,` every three digits of an unsigned integer string
fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
