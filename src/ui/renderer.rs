// Formatting helpers shared by the layout

/// Group the integer digits in threes: 1234567 → "1,234,567"
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Currency with two decimals: 1234.5 → "$1,234.50"
pub fn format_price(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, format_thousands(cents / 100), cents % 100)
}

pub fn format_volume(volume: u64) -> String {
    format_thousands(volume)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1_000), "1,000");
        assert_eq!(format_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(1234.56), "$1,234.56");
        assert_eq!(format_price(50.0), "$50.00");
        assert_eq!(format_price(499.999), "$500.00");
        assert_eq!(format_price(-3.5), "-$3.50");
    }
}
