//! Prices are integer cents end to end; decimal strings only exist at the edges.

use crate::error::CommerceError;

/// Highest price a listing may carry: 999,999.99.
pub const MAX_PRICE_CENTS: i64 = 99_999_999;

/// Parses a decimal price such as `"10"`, `"10.5"` or `"10.50"` into cents.
///
/// At most two fractional digits are accepted and the result must lie in
/// `1..=MAX_PRICE_CENTS`.
pub fn parse_price_cents(input: &str) -> Result<i64, CommerceError> {
    let cents = parse_amount_cents(input)?;
    if cents <= 0 {
        return Err(CommerceError::Validation(
            "Price must be greater than zero".to_string(),
        ));
    }
    if cents > MAX_PRICE_CENTS {
        return Err(CommerceError::Validation(format!(
            "Price must not exceed {}",
            format_cents(MAX_PRICE_CENTS)
        )));
    }
    Ok(cents)
}

/// Like [`parse_price_cents`] but zero is allowed. Used for filter bounds.
pub fn parse_amount_cents(input: &str) -> Result<i64, CommerceError> {
    let invalid = || CommerceError::Validation(format!("Invalid price: '{}'", input));

    let trimmed = input.trim();
    let (whole, fraction) = match trimmed.split_once('.') {
        Some((_, "")) => return Err(invalid()),
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };

    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if fraction.len() > 2 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let whole: i64 = whole.parse().map_err(|_| invalid())?;
    let fraction: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => fraction.parse().map_err(|_| invalid())?,
    };

    let cents = whole
        .checked_mul(100)
        .and_then(|c| c.checked_add(fraction))
        .ok_or_else(invalid)?;

    Ok(cents)
}

/// Formats cents as a plain decimal string, e.g. `1050` -> `"10.50"`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// The seller's cut of a sale. Rounds down; the remainder stays with the platform.
pub fn seller_share_cents(price_cents: i64, share_percent: u8) -> Result<i64, CommerceError> {
    price_cents
        .checked_mul(i64::from(share_percent))
        .map(|scaled| scaled / 100)
        .ok_or_else(|| out_of_range("Seller share"))
}

/// Sum of line prices, failing instead of wrapping.
pub fn sum_cents(amounts: impl IntoIterator<Item = i64>) -> Result<i64, CommerceError> {
    amounts
        .into_iter()
        .try_fold(0i64, |acc, cents| acc.checked_add(cents))
        .ok_or_else(|| out_of_range("Order total"))
}

fn out_of_range(what: &str) -> CommerceError {
    CommerceError::Validation(format!("{} is out of range", what))
}
