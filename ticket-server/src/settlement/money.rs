//! Money calculation utilities using rust_decimal for precision
//!
//! All arithmetic runs on `Decimal` internally and converts to `f64`
//! only at the storage/serialization edge, rounded to 2 decimal places.

use crate::settlement::error::SettlementError;
use rust_decimal::prelude::*;

/// Rounding for monetary values (2 decimal places, half away from zero)
const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Maximum allowed price per line and per callback amount
pub const MAX_PRICE: f64 = 1_000_000.0;

/// Maximum allowed combo quantity per line
pub const MAX_QUANTITY: i32 = 99;

pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or(0.0)
}

/// Equality within `MONEY_TOLERANCE`.
pub fn money_eq(a: f64, b: f64) -> bool {
    (to_decimal(a) - to_decimal(b)).abs() <= MONEY_TOLERANCE
}

/// Whether a callback amount is structurally acceptable: finite,
/// strictly positive and below the cap. Says nothing about matching the
/// order.
pub fn amount_in_range(value: f64) -> bool {
    value.is_finite() && value > 0.0 && value <= MAX_PRICE
}

fn require_finite(value: f64, field: &str) -> Result<(), SettlementError> {
    if !value.is_finite() {
        return Err(SettlementError::InvalidAmount(format!(
            "{} must be a finite number, got {}",
            field, value
        )));
    }
    Ok(())
}

/// Validate a catalog unit price before it is frozen into a line.
pub fn validate_unit_price(value: f64, field: &str) -> Result<(), SettlementError> {
    require_finite(value, field)?;
    if value < 0.0 {
        return Err(SettlementError::InvalidAmount(format!(
            "{} must be non-negative, got {}",
            field, value
        )));
    }
    if value > MAX_PRICE {
        return Err(SettlementError::InvalidAmount(format!(
            "{} exceeds maximum allowed ({}), got {}",
            field, MAX_PRICE, value
        )));
    }
    Ok(())
}

/// Validate a combo quantity.
pub fn validate_quantity(quantity: i32) -> Result<(), SettlementError> {
    if quantity <= 0 {
        return Err(SettlementError::InvalidAmount(format!(
            "quantity must be positive, got {}",
            quantity
        )));
    }
    if quantity > MAX_QUANTITY {
        return Err(SettlementError::InvalidAmount(format!(
            "quantity exceeds maximum allowed ({}), got {}",
            MAX_QUANTITY, quantity
        )));
    }
    Ok(())
}

/// `unit_price * quantity`, rounded at the edge.
pub fn line_total(unit_price: f64, quantity: i32) -> f64 {
    to_f64(to_decimal(unit_price) * Decimal::from(quantity))
}

/// Voucher discount: `min(floor(total * rate), max_value, total)`,
/// floored to whole currency units, never negative.
pub fn discount_amount(candidate_total: f64, rate: f64, max_value: f64) -> f64 {
    let total = to_decimal(candidate_total);
    let floored = (total * to_decimal(rate)).floor();
    let capped = floored.min(to_decimal(max_value)).min(total);
    to_f64(capped.max(Decimal::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_total_is_exact_for_decimal_prices() {
        // The classic f64 trap: 0.1 + 0.2. Decimal keeps it exact.
        assert_eq!(line_total(0.1, 3), 0.3);
        assert_eq!(line_total(50.0, 2), 100.0);
        assert_eq!(line_total(19.99, 3), 59.97);
    }

    #[test]
    fn money_eq_uses_tolerance() {
        assert!(money_eq(270.0, 270.0));
        assert!(money_eq(270.0, 270.004));
        assert!(!money_eq(270.0, 270.02));
    }

    #[test]
    fn discount_floors_to_whole_units() {
        // 7% of 199.99 = 13.9993 -> floored to 13
        assert_eq!(discount_amount(199.99, 0.07, 1000.0), 13.0);
        // Exact case from the checkout flow: 10% of 300 capped at 1000
        assert_eq!(discount_amount(300.0, 0.10, 1000.0), 30.0);
    }

    #[test]
    fn discount_is_capped_by_max_value() {
        assert_eq!(discount_amount(10_000.0, 0.5, 100.0), 100.0);
    }

    #[test]
    fn discount_never_exceeds_total() {
        assert_eq!(discount_amount(40.0, 1.0, 1000.0), 40.0);
        // Rate 1.0 with a small total still clamps at the total
        assert_eq!(discount_amount(0.5, 1.0, 1000.0), 0.0); // floor(0.5) == 0
    }

    #[test]
    fn quantity_bounds() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
        assert!(validate_quantity(MAX_QUANTITY + 1).is_err());
    }

    #[test]
    fn unit_price_bounds() {
        assert!(validate_unit_price(0.0, "price").is_ok());
        assert!(validate_unit_price(150.0, "price").is_ok());
        assert!(validate_unit_price(-1.0, "price").is_err());
        assert!(validate_unit_price(f64::NAN, "price").is_err());
        assert!(validate_unit_price(f64::INFINITY, "price").is_err());
        assert!(validate_unit_price(MAX_PRICE + 1.0, "price").is_err());
    }

    #[test]
    fn amount_range_guard() {
        assert!(amount_in_range(270.0));
        assert!(!amount_in_range(0.0));
        assert!(!amount_in_range(-5.0));
        assert!(!amount_in_range(f64::NAN));
        assert!(!amount_in_range(MAX_PRICE * 2.0));
    }
}
