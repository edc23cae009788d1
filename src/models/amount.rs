//! Conversion between decimal amount strings and integer cents.
//!
//! Amounts arrive from clients as strings such as `"100.5"` and are stored
//! as `i64` cents to avoid floating-point rounding.
//!
//! - `"100"` → 10000 cents
//! - `"100.5"` → 10050 cents
//! - `"100.55"` → 10055 cents

/// Why a decimal amount string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseAmountError {
    #[error("amount cannot be empty")]
    Empty,

    /// More than one decimal separator.
    #[error("invalid amount format")]
    InvalidFormat,

    /// Fractional part with zero or more than two digits.
    #[error("invalid decimal places")]
    InvalidDecimalPlaces,

    #[error("error parsing amount: {0}")]
    NotANumber(String),

    #[error("amount cannot be negative")]
    Negative,
}

/// Parse a decimal amount string into cents.
///
/// The fractional part is right-padded to exactly two digits, concatenated
/// with the integer part and parsed as a single integer.
///
/// # Errors
///
/// - `Empty`: the input is an empty string
/// - `InvalidFormat`: more than one `.` separator
/// - `InvalidDecimalPlaces`: a `.` followed by zero or more than two digits
/// - `NotANumber`: the digits do not form an `i64`
/// - `Negative`: the parsed value is below zero
pub fn parse_amount(amount: &str) -> Result<i64, ParseAmountError> {
    if amount.is_empty() {
        return Err(ParseAmountError::Empty);
    }

    let parts: Vec<&str> = amount.split('.').collect();
    let digits = match parts.as_slice() {
        [int_part] => format!("{int_part}00"),
        [int_part, dec_part] => match dec_part.len() {
            1 => format!("{int_part}{dec_part}0"),
            2 => format!("{int_part}{dec_part}"),
            _ => return Err(ParseAmountError::InvalidDecimalPlaces),
        },
        _ => return Err(ParseAmountError::InvalidFormat),
    };

    let cents: i64 = digits
        .parse()
        .map_err(|e: std::num::ParseIntError| ParseAmountError::NotANumber(e.to_string()))?;

    if cents < 0 {
        return Err(ParseAmountError::Negative);
    }

    Ok(cents)
}

/// Render cents as a decimal string with exactly two fractional digits.
///
/// `format_amount(10050)` is `"100.50"`.
pub fn format_amount(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
