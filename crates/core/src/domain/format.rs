/// Signed percentage with two decimals, e.g. `+12.50%`. Non-finite rates render as `-`.
pub fn format_profit_rate(rate: f64) -> String {
    if !rate.is_finite() {
        return "-".to_string();
    }
    if rate > 0.0 {
        format!("+{rate:.2}%")
    } else if rate < 0.0 {
        format!("{rate:.2}%")
    } else {
        "0.00%".to_string()
    }
}

/// Groups the integer part with commas: `1234567.891` -> `1,234,567.891`.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }

    let raw = value.abs().to_string();
    let (int_part, frac_part) = match raw.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (raw.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (idx, ch) in int_part.chars().enumerate() {
        if idx != 0 && (int_part.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    match frac_part {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profit_rate_is_signed() {
        assert_eq!(format_profit_rate(12.5), "+12.50%");
        assert_eq!(format_profit_rate(-3.0), "-3.00%");
        assert_eq!(format_profit_rate(0.0), "0.00%");
        assert_eq!(format_profit_rate(f64::NAN), "-");
    }

    #[test]
    fn number_groups_thousands() {
        assert_eq!(format_number(1234567.891), "1,234,567.891");
        assert_eq!(format_number(999.0), "999");
        assert_eq!(format_number(1000.0), "1,000");
        assert_eq!(format_number(-12345.5), "-12,345.5");
        assert_eq!(format_number(0.0), "0");
    }
}
