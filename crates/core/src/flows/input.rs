//! Parsers for the free-text answers the pending states expect.

use rust_decimal::Decimal;

use crate::domain::invoice::LineItem;
use crate::errors::InputError;

/// Parses a 1-based line number and returns the 0-based index, rejecting
/// anything outside `1..=item_count`.
pub fn parse_line_choice(text: &str, item_count: usize) -> Result<usize, InputError> {
    let number: usize = text.trim().parse().map_err(|_| InputError::InvalidLineNumber)?;
    if number == 0 || number > item_count {
        return Err(InputError::InvalidLineNumber);
    }
    Ok(number - 1)
}

/// Parses a user-supplied amount, stripping any non-digit characters first
/// ("50 шт" → 50).
pub fn parse_user_number(text: &str) -> Result<Decimal, InputError> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(InputError::InvalidNumber);
    }
    digits.parse().map_err(|_| InputError::InvalidNumber)
}

/// Parses the `name, quantity, price` form for a new line item. Quantity and
/// price fall back to zero when unreadable; a missing field is an error.
pub fn parse_new_item(text: &str) -> Result<LineItem, InputError> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if parts.len() < 3 {
        return Err(InputError::MalformedItem);
    }

    let quantity = parse_user_number(parts[1]).unwrap_or(Decimal::ZERO);
    let unit_price = parse_user_number(parts[2]).unwrap_or(Decimal::ZERO);
    Ok(LineItem::new(parts[0], quantity, unit_price))
}
