/// Parse a user-typed decimal amount ("1.25") into base units for a mint with
/// `decimals`. Returns `None` for empty, malformed, negative or overflowing
/// input, or when more fractional digits are given than the mint supports.
pub fn parse_decimal_amount(input: &str, decimals: u8) -> Option<u64> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let (whole, fraction) = match input.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (input, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if fraction.len() > decimals as usize {
        return None;
    }

    let scale = 10u64.checked_pow(decimals as u32)?;
    let whole_units = if whole.is_empty() { 0 } else { whole.parse::<u64>().ok()? };
    let mut fraction_units = if fraction.is_empty() { 0 } else { fraction.parse::<u64>().ok()? };
    for _ in fraction.len()..decimals as usize {
        fraction_units = fraction_units.checked_mul(10)?;
    }

    whole_units.checked_mul(scale)?.checked_add(fraction_units)
}

/// Render base units as a decimal string without trailing zeros.
pub fn format_decimal_amount(amount: u64, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    // Past 38 decimals no u64 amount has a whole part worth printing.
    let Some(scale) = 10u128.checked_pow(decimals as u32) else {
        return amount.to_string();
    };
    let amount = amount as u128;
    let whole = amount / scale;
    let fraction = amount % scale;
    if fraction == 0 {
        return whole.to_string();
    }
    let fraction = format!("{:0width$}", fraction, width = decimals as usize);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}

/// Base units to a float in whole-token units, for display and valuation.
pub fn to_ui_amount(amount: u64, decimals: u8) -> f64 {
    amount as f64 / 10f64.powi(decimals as i32)
}
