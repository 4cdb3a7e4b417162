/// Parse a raw cell as a finite number
///
/// # Arguments
/// * `raw` - Cell text as read from the CSV
///
/// # Returns
/// * `Some(value)` if the trimmed text parses to a finite `f64`
/// * `None` for empty, non-numeric, NaN or infinite values
pub fn parse_number(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

/// Normalize a raw identifier cell to a stable string key
///
/// Numeric ids with no fractional part render as integers so that `7`,
/// `7.0` and ` 7 ` all name the same patient. Other text is kept verbatim
/// apart from surrounding whitespace.
pub fn normalize_identifier(raw: &str) -> String {
    let trimmed = raw.trim();
    match parse_number(trimmed) {
        Some(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
            format!("{}", value as i64)
        }
        _ => trimmed.to_string(),
    }
}

/// Render a number compactly: whole values without a decimal point
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_valid() {
        assert_eq!(parse_number("5"), Some(5.0));
        assert_eq!(parse_number(" 2.5 "), Some(2.5));
        assert_eq!(parse_number("-3"), Some(-3.0));
        assert_eq!(parse_number("1e2"), Some(100.0));
    }

    #[test]
    fn test_parse_number_invalid() {
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("n/a"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("-infinity"), None);
    }

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier("7"), "7");
        assert_eq!(normalize_identifier("7.0"), "7");
        assert_eq!(normalize_identifier(" 12 "), "12");
        assert_eq!(normalize_identifier("7.5"), "7.5");
        assert_eq!(normalize_identifier("P-001"), "P-001");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(4.0), "4");
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(1.5), "1.5");
    }
}
