//! Shared types for order assembly and settlement

use serde::{Deserialize, Serialize};

// ============================================================================
// Seat Lines
// ============================================================================

/// 座位类型（定价等级）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatClass {
    /// 普通座
    #[default]
    Standard,
    /// VIP 座
    Vip,
    /// 情侣座
    Couple,
}

/// One reserved chair inside an order, priced at assembly time.
///
/// The unit price is frozen here; later catalog price changes never
/// reflow into an existing order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeatLine {
    /// Chair record id (e.g. `chair:r1a1`)
    pub chair_id: String,
    /// Display name (e.g. `A1`)
    pub chair_name: String,
    /// Pricing class at assembly time
    pub class: SeatClass,
    /// Price charged for this chair
    pub unit_price: f64,
}

// ============================================================================
// Combo Lines
// ============================================================================

/// One concession combo line, priced at assembly time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComboLine {
    /// Combo record id (e.g. `combo:popcorn`)
    pub combo_id: String,
    /// Display name snapshot
    pub name: String,
    /// Unit price at assembly time
    pub unit_price: f64,
    /// Ordered quantity (validated positive and bounded)
    pub quantity: i32,
    /// Computed `unit_price * quantity`
    pub line_total: f64,
}

// ============================================================================
// Voucher
// ============================================================================

/// Voucher application recorded on the order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppliedVoucher {
    /// Voucher code as entered
    pub code: String,
    /// Discount rate in (0, 1]
    pub rate: f64,
    /// Absolute discount cap
    pub max_value: f64,
    /// Granted discount after flooring and capping
    pub discount: f64,
}

// ============================================================================
// Settlement Failure
// ============================================================================

/// 订单结算失败原因
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    /// 支付网关拒绝
    GatewayDeclined,
    /// 回调金额与订单应付金额不符
    AmountMismatch,
    /// 已付款但座位保留已过期（需人工对账退款）
    SeatsLostAfterPayment,
    /// 结算过程内部错误
    SettlementError,
}

impl FailureReason {
    /// Whether an operator has to reconcile this order by hand.
    ///
    /// `SeatsLostAfterPayment`: the customer paid but the seats were
    /// gone. `SettlementError`: settlement died mid-flight and the money
    /// state is unproven. Refunds are out of band and never issued
    /// automatically.
    pub fn needs_reconciliation(&self) -> bool {
        matches!(
            self,
            FailureReason::SeatsLostAfterPayment | FailureReason::SettlementError
        )
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureReason::GatewayDeclined => "GATEWAY_DECLINED",
            FailureReason::AmountMismatch => "AMOUNT_MISMATCH",
            FailureReason::SeatsLostAfterPayment => "SEATS_LOST_AFTER_PAYMENT",
            FailureReason::SettlementError => "SETTLEMENT_ERROR",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Payment Attempt
// ============================================================================

/// Durable record of one gateway callback that settled (or tried to
/// settle) an order. The raw payload is kept verbatim for audit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentAttempt {
    /// Order this attempt belongs to
    pub order_id: String,
    /// 1-based sequence within the order
    pub attempt_no: u64,
    /// Gateway transaction reference, when provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_txn_no: Option<String>,
    /// Gateway response code as received
    pub response_code: String,
    /// Callback amount as received
    pub amount: f64,
    /// Raw query string exactly as delivered
    pub raw_payload: String,
    /// Receipt timestamp (ms)
    pub received_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seat_class_uses_screaming_snake_case() {
        let json = serde_json::to_string(&SeatClass::Vip).unwrap();
        assert_eq!(json, "\"VIP\"");
        let back: SeatClass = serde_json::from_str("\"COUPLE\"").unwrap();
        assert_eq!(back, SeatClass::Couple);
    }

    #[test]
    fn unproven_money_reasons_are_flagged_for_reconciliation() {
        assert!(FailureReason::SeatsLostAfterPayment.needs_reconciliation());
        assert!(FailureReason::SettlementError.needs_reconciliation());
        assert!(!FailureReason::GatewayDeclined.needs_reconciliation());
        assert!(!FailureReason::AmountMismatch.needs_reconciliation());
    }

    #[test]
    fn failure_reason_display_matches_wire_form() {
        let json = serde_json::to_string(&FailureReason::SeatsLostAfterPayment).unwrap();
        assert_eq!(json, format!("\"{}\"", FailureReason::SeatsLostAfterPayment));
    }
}
