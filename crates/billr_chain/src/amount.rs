//! Conversion between display amounts and the token's integer unit.
//!
//! USDC on the ledger carries 7 fractional digits, so `1.0` is `10_000_000`
//! in the smallest unit. Conversion to the smallest unit is exact decimal
//! arithmetic; conversion back is for display only and rounds to cents.

use crate::error::{ChainError, Result};

/// Fractional digits of the payment token.
pub const USDC_DECIMALS: u32 = 7;

const SCALE: u128 = 10u128.pow(USDC_DECIMALS);

/// Convert a decimal string such as `"12.5"` into the smallest-unit integer
/// string (`"125000000"`). Extra fractional digits are truncated.
pub fn to_smallest_unit(decimal: &str) -> Result<String> {
    let input = decimal.trim();
    let invalid = |reason: &str| ChainError::InvalidAmount(format!("{reason}: {decimal:?}"));

    if input.starts_with('-') {
        return Err(invalid("amount must be greater than 0"));
    }
    let unsigned = input.strip_prefix('+').unwrap_or(input);

    let (whole, fraction) = match unsigned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (unsigned, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("not a number"));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid("not a number"));
    }

    let whole = whole.trim_start_matches('0');
    // u64::MAX has 20 digits; anything longer overflows regardless of scale.
    if whole.len() > 20 {
        return Err(invalid("amount too large"));
    }
    let whole_value: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid("not a number"))?
    };

    let mut frac_digits: String = fraction.chars().take(USDC_DECIMALS as usize).collect();
    while frac_digits.len() < USDC_DECIMALS as usize {
        frac_digits.push('0');
    }
    let frac_value: u128 = frac_digits.parse().map_err(|_| invalid("not a number"))?;

    let total = whole_value
        .checked_mul(SCALE)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(|| invalid("amount too large"))?;

    if total == 0 {
        return Err(invalid("amount must be greater than 0"));
    }
    if total > u64::MAX as u128 {
        return Err(invalid("amount too large"));
    }
    Ok(total.to_string())
}

/// Render a smallest-unit integer string with two decimals, rounding half up.
///
/// Display only: the result is lossy and must not be fed back into contract
/// calls. Unparseable input renders as `"0.00"`.
pub fn from_smallest_unit(integer: &str) -> String {
    let Ok(value) = integer.trim().parse::<i128>() else {
        return "0.00".to_string();
    };

    let negative = value < 0;
    let magnitude = value.unsigned_abs();
    let cents_divisor = SCALE / 100;
    let cents = (magnitude + cents_divisor / 2) / cents_divisor;

    format!(
        "{}{}.{:02}",
        if negative && cents > 0 { "-" } else { "" },
        cents / 100,
        cents % 100
    )
}

/// Parse a smallest-unit string for comparison. Unparseable values count as
/// zero.
pub(crate) fn parse_units(value: &str) -> i128 {
    value.trim().parse::<i128>().unwrap_or(0)
}

/// Parse an amount that is about to go on the wire: a positive integer of
/// the smallest unit that fits in `u64`. Display decimals are rejected.
pub(crate) fn require_units(value: &str) -> Result<i128> {
    let digits = value.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ChainError::InvalidAmount(format!(
            "expected an integer amount in the smallest unit: {value:?}"
        )));
    }
    match digits.parse::<u64>() {
        Ok(0) => Err(ChainError::InvalidAmount(format!(
            "amount must be greater than 0: {value:?}"
        ))),
        Ok(units) => Ok(i128::from(units)),
        Err(_) => Err(ChainError::InvalidAmount(format!("amount too large: {value:?}"))),
    }
}
