//! Fixed-point balance arithmetic.
//!
//! Balances use a 64.64 binary fixed-point type. Sums and differences are
//! exact, so crediting and debiting the same value any number of times never
//! drifts the way `f64` does. Only input amounts are limited to
//! [`AMOUNT_SIGNIFICANT_DIGITS`] decimal digits; stored balances are never
//! rounded.

use crate::error::ChainError;
use fixed::types::I64F64;

pub type Amount = I64F64;

/// Significant decimal digits accepted when parsing an amount.
pub const AMOUNT_SIGNIFICANT_DIGITS: usize = 10;

pub const ZERO: Amount = Amount::ZERO;

/// Parses a decimal string such as `"40"` or `"12.5"`.
pub fn parse_amount(s: &str) -> Result<Amount, ChainError> {
    let trimmed = s.trim();
    let unsigned = trimmed.trim_start_matches(['-', '+']);
    let significant = match unsigned.split_once('.') {
        Some((whole, frac)) => format!("{}{}", whole, frac.trim_end_matches('0')),
        None => unsigned.to_string(),
    };
    let digits = significant
        .chars()
        .filter(|c| c.is_ascii_digit())
        .skip_while(|c| *c == '0')
        .count();
    if digits > AMOUNT_SIGNIFICANT_DIGITS {
        return Err(ChainError::InvalidTransaction(format!(
            "Amount {} exceeds {} significant digits",
            trimmed, AMOUNT_SIGNIFICANT_DIGITS
        )));
    }
    trimmed
        .parse::<Amount>()
        .map_err(|e| ChainError::InvalidTransaction(format!("Invalid amount '{}': {}", trimmed, e)))
}

/// Builds an amount from a whole number of units.
pub fn units(n: i64) -> Amount {
    Amount::from_num(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_and_fractional() {
        assert_eq!(parse_amount("40").unwrap(), units(40));
        assert_eq!(parse_amount(" 12.5 ").unwrap(), Amount::from_num(12.5));
        assert_eq!(parse_amount("-3").unwrap(), units(-3));
    }

    #[test]
    fn test_parse_rejects_garbage_and_excess_precision() {
        assert!(parse_amount("forty").is_err());
        assert!(parse_amount("1.2345678901").is_err());
        assert!(parse_amount("0.00012345678901").is_err());
        assert!(parse_amount("100.000000000000").is_ok());
        assert!(parse_amount("0.123456789").is_ok());
    }

    #[test]
    fn test_large_and_tiny_amounts_stay_exact() {
        let big = parse_amount("9999999999").unwrap();
        assert_eq!(big + big, units(19_999_999_998));
        assert_eq!(big + big - units(1), units(19_999_999_997));

        let tiny = parse_amount("0.0000000001").unwrap();
        assert_ne!(tiny, ZERO);
        assert_eq!(units(10) - tiny + tiny, units(10));
        assert!(units(10) - tiny < units(10));
    }

    #[test]
    fn test_repeated_tenths_do_not_drift() {
        let tenth = parse_amount("0.1").unwrap();
        let mut a = units(100);
        let mut b = ZERO;
        for _ in 0..1000 {
            a -= tenth;
            b += tenth;
        }
        assert_eq!(a + b, units(100));
    }
}
