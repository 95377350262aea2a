//! Order assembly pricing
//!
//! Pure: catalog rows in, frozen priced lines out. Nothing here touches
//! storage; the coordinator resolves the inputs and persists the result.

use crate::db::models::{Chair, Combo};
use crate::settlement::error::SettlementError;
use crate::settlement::money;
use rust_decimal::Decimal;
use shared::order::{AppliedVoucher, ComboLine, SeatLine};

/// Priced lines before any discount.
#[derive(Debug, Clone)]
pub struct PricedLines {
    pub seats: Vec<SeatLine>,
    pub combos: Vec<ComboLine>,
    /// `sum(seat price) + sum(combo line totals)`
    pub total_price: f64,
}

/// Final immutable pricing of one order.
#[derive(Debug, Clone)]
pub struct AssembledOrder {
    pub seats: Vec<SeatLine>,
    pub combos: Vec<ComboLine>,
    pub voucher: Option<AppliedVoucher>,
    pub total_price: f64,
    pub discount_price: f64,
    /// `max(0, total_price - discount_price)`
    pub payment_price: f64,
}

/// Freeze catalog prices into seat and combo lines and total them.
///
/// Every price is validated before it is frozen; a validation failure
/// leaves no trace anywhere.
pub fn price_order(
    chairs: &[Chair],
    combo_picks: &[(Combo, i32)],
) -> Result<PricedLines, SettlementError> {
    let mut seats = Vec::with_capacity(chairs.len());
    let mut total = Decimal::ZERO;

    for chair in chairs {
        money::validate_unit_price(chair.price, "chair price")?;
        total += money::to_decimal(chair.price);
        seats.push(SeatLine {
            chair_id: chair.id_string(),
            chair_name: chair.name.clone(),
            class: chair.class,
            unit_price: chair.price,
        });
    }

    let mut combos = Vec::with_capacity(combo_picks.len());
    for (combo, quantity) in combo_picks {
        money::validate_unit_price(combo.price, "combo price")?;
        money::validate_quantity(*quantity)?;
        let line_total = money::line_total(combo.price, *quantity);
        total += money::to_decimal(line_total);
        combos.push(ComboLine {
            combo_id: combo.id_string(),
            name: combo.name.clone(),
            unit_price: combo.price,
            quantity: *quantity,
            line_total,
        });
    }

    Ok(PricedLines {
        seats,
        combos,
        total_price: money::to_f64(total),
    })
}

/// Apply an (already evaluated) discount and compute the payable amount.
pub fn apply_discount(lines: PricedLines, voucher: Option<AppliedVoucher>) -> AssembledOrder {
    let discount_price = voucher.as_ref().map(|v| v.discount).unwrap_or(0.0);
    let payable = (money::to_decimal(lines.total_price) - money::to_decimal(discount_price))
        .max(Decimal::ZERO);
    AssembledOrder {
        seats: lines.seats,
        combos: lines.combos,
        voucher,
        total_price: lines.total_price,
        discount_price,
        payment_price: money::to_f64(payable),
    }
}
