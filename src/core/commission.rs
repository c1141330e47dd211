//! Commission calculation and currency helpers.
//!
//! All money in the ledger is BRL held in `f64` and rounded half-up to cents at
//! every step, so values shown to users never carry float drift.

use crate::errors::{Error, Result};

/// Share of the order value paid to the referring affiliate.
pub const COMMISSION_RATE: f64 = 0.25;

/// Smallest balance an affiliate may withdraw.
pub const MIN_WITHDRAWAL: f64 = 50.00;

// Absorbs binary representation error (19.90 * 25 = 497.4999...) before rounding.
const ROUNDING_NUDGE: f64 = 1e-9;

/// Rounds a currency value half-up to two decimal places.
#[must_use]
pub fn round_currency(value: f64) -> f64 {
    let scaled = value * 100.0;
    (scaled + scaled.signum() * ROUNDING_NUDGE).round() / 100.0
}

/// Computes the commission owed for an order: `round(order_value * 0.25, 2)`.
///
/// # Errors
/// Returns [`Error::InputValidation`] if `order_value` is negative, NaN or infinite.
pub fn commission(order_value: f64) -> Result<f64> {
    if !order_value.is_finite() || order_value < 0.0 {
        return Err(Error::invalid(format!(
            "order value must be a non-negative amount, got {order_value}"
        )));
    }
    Ok(round_currency(order_value * COMMISSION_RATE))
}

/// Whether a balance is large enough to be withdrawn.
#[must_use]
pub fn can_withdraw(balance: f64) -> bool {
    round_currency(balance) >= MIN_WITHDRAWAL
}

/// Extracts a price from display text such as `"R$ 19,90/mês"`, `"R$ 1.299,90"`
/// or `"19.90"`.
///
/// When a comma is present it is the decimal separator and dots are thousands
/// separators; otherwise a dot is the decimal separator.
///
/// # Errors
/// Returns [`Error::InputValidation`] if no number can be read from the text.
pub fn parse_price(text: &str) -> Result<f64> {
    let trimmed = text.trim();
    let without_symbol = trimmed.strip_prefix("R$").unwrap_or(trimmed).trim_start();
    let number: String = without_symbol
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    let normalized = if number.contains(',') {
        number.replace('.', "").replace(',', ".")
    } else {
        number
    };

    normalized
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(round_currency)
        .ok_or_else(|| Error::invalid(format!("cannot read a price from '{text}'")))
}

/// Formats a value the way the site displays prices: `R$ 1.234,56`.
#[must_use]
pub fn format_brl(value: f64) -> String {
    let cents = (round_currency(value) * 100.0).round() as i64;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.abs();
    let units = (cents / 100).to_string();

    let mut grouped = String::with_capacity(units.len() + units.len() / 3);
    for (i, digit) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    format!("{sign}R$ {grouped},{:02}", cents % 100)
}
