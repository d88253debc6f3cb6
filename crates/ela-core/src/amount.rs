//! Fixed-point amount parsing and formatting (8 decimal places).

use crate::constants::{AMOUNT_DECIMALS, COIN};
use crate::error::SerializationError;

/// Parse a decimal string such as `"1.5"` or `"0.00010000"` into sela.
///
/// At most 8 fractional digits are accepted; signs, exponents and values
/// above `i64::MAX` sela are rejected.
pub fn parse_amount(s: &str) -> Result<u64, SerializationError> {
    let invalid = || SerializationError::InvalidAmount(s.to_string());
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !all_digits(frac) || frac.len() > AMOUNT_DECIMALS as usize {
        return Err(invalid());
    }

    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
    let mut frac_value: u64 = if frac.is_empty() { 0 } else { frac.parse().map_err(|_| invalid())? };
    frac_value *= 10u64.pow(AMOUNT_DECIMALS - frac.len() as u32);

    let value = whole
        .checked_mul(COIN)
        .and_then(|v| v.checked_add(frac_value))
        .filter(|v| *v <= i64::MAX as u64)
        .ok_or_else(invalid)?;
    Ok(value)
}

/// Format sela as a decimal string with all 8 fractional digits.
pub fn format_amount(value: u64) -> String {
    format!("{}.{:08}", value / COIN, value % COIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_node_values() {
        assert_eq!(parse_amount("1.00000000").unwrap(), 100_000_000);
        assert_eq!(parse_amount("0.5").unwrap(), 50_000_000);
        assert_eq!(parse_amount("12").unwrap(), 1_200_000_000);
        assert_eq!(parse_amount("0.00000001").unwrap(), 1);
        assert_eq!(parse_amount(".25").unwrap(), 25_000_000);
    }

    #[test]
    fn rejects_malformed() {
        for bad in ["", ".", "-1", "1.000000001", "1e8", "1,5", "abc", "99999999999999999999"] {
            assert!(parse_amount(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn formats_with_eight_decimals() {
        assert_eq!(format_amount(100_000_000), "1.00000000");
        assert_eq!(format_amount(49_990_000), "0.49990000");
        assert_eq!(format_amount(0), "0.00000000");
    }
}
