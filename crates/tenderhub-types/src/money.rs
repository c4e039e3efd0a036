use crate::error::{MarketError, Result};

/// Round a monetary amount to two decimal places.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Reject negative, NaN and infinite amounts.
pub fn validate_amount(amount: f64) -> Result<f64> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(MarketError::InvalidAmount(amount));
    }
    Ok(amount)
}
