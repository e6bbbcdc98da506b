// Numeric parsing for scraped market values.

/// Parse a scraped number:
/// - Strip thousands separators, `%` and whitespace
/// - Allow a single leading `+` or `-`
/// - Returns None for placeholders (`N/A`, `-`, empty) or anything non-numeric
pub fn parse_decimal(s: &str) -> Option<f64> {
    let cleaned: String = s
        .chars()
        .filter(|c| *c != ',' && *c != '%' && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    let mut digits = 0;
    for (i, c) in cleaned.chars().enumerate() {
        match c {
            '0'..='9' => digits += 1,
            '.' => {}
            '-' | '+' if i == 0 => {}
            _ => return None,
        }
    }
    if digits == 0 {
        return None;
    }

    let value: f64 = cleaned.parse().ok()?;
    value.is_finite().then_some(value)
}
