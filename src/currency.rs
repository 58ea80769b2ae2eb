//! Currency-aware minor-unit handling.
//!
//! Donation amounts are stored in the smallest currency unit (kobo, cents,
//! fils). Novac's checkout API takes major-unit decimal amounts, so the
//! exponent table below drives the conversion instead of a blanket
//! divide-by-100.

use bigdecimal::BigDecimal;

/// Currencies accepted by the Novac hosted checkout.
pub const SUPPORTED_CURRENCIES: &[&str] = &["NGN", "GHS", "USD", "EUR", "GBP", "ZAR", "KES", "JPY", "KWD"];

const ZERO_DECIMAL: &[&str] = &["JPY", "KRW", "VND", "UGX", "XOF", "XAF", "CLP", "RWF"];
const THREE_DECIMAL: &[&str] = &["BHD", "IQD", "JOD", "KWD", "LYD", "OMR", "TND"];

/// Number of minor-unit digits for a currency code, or `None` when the
/// currency is not supported by the gateway.
pub fn minor_unit_exponent(currency: &str) -> Option<u32> {
    let code = currency.trim().to_ascii_uppercase();
    if !SUPPORTED_CURRENCIES.contains(&code.as_str()) {
        return None;
    }
    if ZERO_DECIMAL.contains(&code.as_str()) {
        Some(0)
    } else if THREE_DECIMAL.contains(&code.as_str()) {
        Some(3)
    } else {
        Some(2)
    }
}

pub fn is_supported(currency: &str) -> bool {
    minor_unit_exponent(currency).is_some()
}

/// Converts a stored minor-unit amount to the major-unit decimal Novac
/// expects, e.g. 150000 kobo NGN -> 1500.00.
pub fn to_major_units(amount_minor: i64, currency: &str) -> Option<BigDecimal> {
    let exponent = minor_unit_exponent(currency)?;
    Some(BigDecimal::new(amount_minor.into(), exponent as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_decimal_currency_divides_by_hundred() {
        assert_eq!(to_major_units(150_000, "NGN").unwrap().to_string(), "1500.00");
        assert_eq!(to_major_units(999, "USD").unwrap().to_string(), "9.99");
    }

    #[test]
    fn zero_decimal_currency_passes_through() {
        assert_eq!(to_major_units(5000, "JPY").unwrap().to_string(), "5000");
    }

    #[test]
    fn three_decimal_currency_divides_by_thousand() {
        assert_eq!(to_major_units(1500, "KWD").unwrap().to_string(), "1.500");
    }

    #[test]
    fn unsupported_currency_is_rejected() {
        assert!(to_major_units(100, "BTC").is_none());
        assert!(!is_supported("XYZ"));
    }

    #[test]
    fn currency_code_is_case_insensitive() {
        assert_eq!(minor_unit_exponent("ngn"), Some(2));
        assert_eq!(minor_unit_exponent(" usd "), Some(2));
    }
}
