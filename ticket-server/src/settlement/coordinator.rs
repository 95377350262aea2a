//! Order settlement coordinator
//!
//! Owns the order lifecycle:
//!
//! ```text
//! PENDING ──► COMPLETED ──► PRINTED
//!    │
//!    ├──► FAILED    (declined / amount mismatch / seats lost)
//!    └──► CANCELED  (customer abandoned before paying)
//! ```
//!
//! Orders are created from a live seat hold, priced once, and then only
//! ever transitioned. The callback handler is the critical section: it
//! must stay idempotent under gateway retries and can never let a
//! verified order linger `PENDING`.

use crate::db::Catalog;
use crate::gateway::{self, CallbackPayload, PaymentGatewayAdapter};
use crate::seating::{SeatStore, SeatStoreError};
use crate::settlement::assembler::{apply_discount, price_order};
use crate::settlement::error::{SettlementError, SettlementResult};
use crate::settlement::money;
use crate::settlement::storage::{AttemptDraft, OrderStorage, TransitionOutcome};
use shared::order::{FailureReason, OrderSnapshot, OrderStatus};
use shared::util::now_millis;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// One combo line requested by the client.
#[derive(Debug, Clone)]
pub struct ComboSelection {
    pub combo_id: String,
    pub quantity: i32,
}

/// Domain-level order creation input (already shape-validated at the
/// API edge).
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub showtime_id: String,
    pub hold_token: String,
    pub combos: Vec<ComboSelection>,
    pub voucher_code: Option<String>,
}

/// What the gateway is told about a processed callback.
///
/// `Completed` means the order is COMPLETED, settled by this callback
/// or an earlier duplicate. Everything else collapses into `Failed`:
/// declines, mismatches, unknown orders, failed verification and
/// internal faults all look identical from outside. The distinctions
/// live in the audit trail, not the response.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    Completed { order_id: String },
    Failed { order_id: Option<String> },
}

impl CallbackOutcome {
    /// Acknowledgement body in the gateway's own vocabulary.
    pub fn gateway_body(&self) -> &'static str {
        match self {
            CallbackOutcome::Completed { .. } => "success",
            CallbackOutcome::Failed { .. } => "failure",
        }
    }
}

pub struct SettlementCoordinator {
    seats: SeatStore,
    storage: OrderStorage,
    catalog: Arc<Catalog>,
    vouchers: Arc<crate::vouchers::VoucherEngine>,
    gateway: Arc<PaymentGatewayAdapter>,
}

impl SettlementCoordinator {
    pub fn new(
        seats: SeatStore,
        storage: OrderStorage,
        catalog: Arc<Catalog>,
        vouchers: Arc<crate::vouchers::VoucherEngine>,
        gateway: Arc<PaymentGatewayAdapter>,
    ) -> Self {
        Self {
            seats,
            storage,
            catalog,
            vouchers,
            gateway,
        }
    }

    pub fn storage(&self) -> &OrderStorage {
        &self.storage
    }

    // ========== Order creation ==========

    /// Assemble and persist a PENDING order from a live hold.
    ///
    /// The hold is re-bound to the freshly minted order id, so from
    /// this point the settlement paths (not the original selector)
    /// control the seats.
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> SettlementResult<OrderSnapshot> {
        let now = now_millis();

        let hold = self
            .seats
            .get_hold(&request.hold_token)?
            .ok_or_else(|| SettlementError::HoldInvalid("unknown hold token".to_string()))?;
        if hold.confirmed {
            return Err(SettlementError::HoldInvalid(
                "hold already confirmed".to_string(),
            ));
        }
        if hold.is_expired(now) {
            return Err(SettlementError::HoldInvalid("hold lease expired".to_string()));
        }
        if hold.showtime_id != request.showtime_id {
            return Err(SettlementError::HoldInvalid(
                "hold belongs to a different showtime".to_string(),
            ));
        }

        let showtime = self
            .catalog
            .showtimes
            .find_by_id(&request.showtime_id)
            .await?
            .ok_or_else(|| SettlementError::ShowtimeNotFound(request.showtime_id.clone()))?;

        let chairs = self.catalog.chairs.find_by_ids(&hold.chair_ids).await?;
        if chairs.len() != hold.chair_ids.len() {
            return Err(SettlementError::HoldInvalid(
                "held chair missing from catalog".to_string(),
            ));
        }

        let mut combo_lines = Vec::with_capacity(request.combos.len());
        for selection in &request.combos {
            let combo = self
                .catalog
                .combos
                .find_by_id(&selection.combo_id)
                .await?
                .ok_or_else(|| SettlementError::ComboNotFound(selection.combo_id.clone()))?;
            combo_lines.push((combo, selection.quantity));
        }

        // Price once; the snapshot below is immutable from here on.
        let priced = price_order(&chairs, &combo_lines)?;
        let voucher = match &request.voucher_code {
            Some(code) => Some(self.vouchers.evaluate(code, priced.total_price, now)?),
            None => None,
        };
        let assembled = apply_discount(priced, voucher);

        let order_id = Uuid::new_v4().to_string();
        self.seats.rebind_holder(&request.hold_token, &order_id)?;

        let mut snapshot = OrderSnapshot::new(&order_id, &request.showtime_id, &request.hold_token);
        snapshot.seats = assembled.seats;
        snapshot.combos = assembled.combos;
        snapshot.voucher = assembled.voucher;
        snapshot.total_price = assembled.total_price;
        snapshot.discount_price = assembled.discount_price;
        snapshot.payment_price = assembled.payment_price;
        self.storage.insert_order(&snapshot)?;

        info!(
            order_id = %snapshot.order_id,
            showtime = %showtime.id_string(),
            seats = snapshot.seat_count(),
            total = snapshot.total_price,
            payable = snapshot.payment_price,
            "order created"
        );
        Ok(snapshot)
    }

    // ========== Queries ==========

    pub fn order_status(&self, order_id: &str) -> SettlementResult<OrderSnapshot> {
        self.require_order(order_id)
    }

    fn require_order(&self, order_id: &str) -> SettlementResult<OrderSnapshot> {
        self.storage
            .get_order(order_id)?
            .ok_or_else(|| SettlementError::OrderNotFound(order_id.to_string()))
    }

    // ========== Payment redirect ==========

    /// Signed gateway redirect URL; only a PENDING order can start
    /// (or restart) payment.
    pub fn create_payment_url(&self, order_id: &str) -> SettlementResult<String> {
        let order = self.require_order(order_id)?;
        if !order.is_pending() {
            return Err(SettlementError::InvalidState {
                expected: OrderStatus::Pending,
                found: order.status,
            });
        }
        Ok(self
            .gateway
            .create_payment_url(order_id, order.payment_price))
    }

    // ========== Cancellation ==========

    /// Customer abandonment. Only PENDING orders cancel; the seats go
    /// straight back on sale.
    pub fn cancel(&self, order_id: &str) -> SettlementResult<OrderSnapshot> {
        match self.storage.cancel_order(order_id)? {
            TransitionOutcome::Applied(snapshot) => {
                self.seats.release(&snapshot.hold_token)?;
                info!(order_id = order_id, "order canceled, seats released");
                Ok(snapshot)
            }
            TransitionOutcome::StateMismatch(snapshot) => Err(SettlementError::InvalidState {
                expected: OrderStatus::Pending,
                found: snapshot.status,
            }),
            TransitionOutcome::NotFound => {
                Err(SettlementError::OrderNotFound(order_id.to_string()))
            }
        }
    }

    // ========== Gateway callback ==========

    /// Process a gateway callback. Infallible at this boundary. A fault
    /// before the signature verifies (or before the order is known)
    /// degrades to a generic rejection with no state change; a fault
    /// after a verified PENDING order settles it FAILED with
    /// `SETTLEMENT_ERROR` so the order never lingers PENDING behind the
    /// same fault on every retry.
    pub fn handle_callback(
        &self,
        raw_query: &str,
        params: &BTreeMap<String, String>,
    ) -> CallbackOutcome {
        match self.try_handle_callback(raw_query, params) {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(error = %err, "callback processing failed");
                // Best effort; the raw payload must not vanish silently.
                if let Err(audit_err) =
                    self.storage
                        .append_audit(raw_query, false, None, "internal error")
                {
                    error!(error = %audit_err, "callback audit write failed");
                }
                CallbackOutcome::Failed { order_id: None }
            }
        }
    }

    fn try_handle_callback(
        &self,
        raw_query: &str,
        params: &BTreeMap<String, String>,
    ) -> SettlementResult<CallbackOutcome> {
        // 1. Authenticate, then shape-check. Nothing before this line
        //    is trusted, including the order id used in the audit row.
        let payload = match self.gateway.verify_callback(params) {
            Ok(payload) => payload,
            Err(err) => {
                let order_hint = params.get(gateway::FIELD_ORDER_ID).map(String::as_str);
                warn!(target: "audit", error = %err, "callback rejected");
                self.storage.append_audit(
                    raw_query,
                    err.authenticated(),
                    order_hint,
                    &format!("rejected: {err}"),
                )?;
                return Ok(CallbackOutcome::Failed {
                    order_id: order_hint.map(String::from),
                });
            }
        };

        // 2. The order must exist.
        let order = match self.storage.get_order(&payload.order_id)? {
            Some(order) => order,
            None => {
                warn!(order_id = %payload.order_id, "callback for unknown order");
                self.storage.append_audit(
                    raw_query,
                    true,
                    Some(&payload.order_id),
                    "unknown order",
                )?;
                return Ok(CallbackOutcome::Failed {
                    order_id: Some(payload.order_id),
                });
            }
        };

        // 3. Fast idempotency path. The authoritative status check runs
        //    again inside the settle transaction; this read only spares
        //    retries the seat work.
        if !order.is_pending() {
            self.storage.append_audit(
                raw_query,
                true,
                Some(&order.order_id),
                &format!("duplicate, order already {}", order.status),
            )?;
            return Ok(Self::recorded_outcome(order));
        }

        // 4. Decide. A verified signature says the gateway sent this;
        //    the response code and amount decide what it means.
        let order_id = order.order_id.clone();
        let decided = if payload.is_success() && money::money_eq(payload.amount, order.payment_price)
        {
            self.settle_success(raw_query, order, &payload)
        } else if payload.is_success() {
            warn!(
                order_id = %order.order_id,
                expected = order.payment_price,
                received = payload.amount,
                "callback amount mismatch"
            );
            self.settle_failure(raw_query, order, &payload, FailureReason::AmountMismatch)
        } else {
            self.settle_failure(raw_query, order, &payload, FailureReason::GatewayDeclined)
        };

        // Past verification the order must not stay PENDING, whatever
        // broke on the way.
        match decided {
            Ok(outcome) => Ok(outcome),
            Err(err) => Ok(self.settle_internal_failure(raw_query, &order_id, &payload, err)),
        }
    }

    /// Payment went through for the right amount: turn the hold into a
    /// sale, then settle. Confirm comes first and re-confirm is
    /// idempotent, so a crash between the two writes converges on the
    /// gateway's next retry.
    fn settle_success(
        &self,
        raw_query: &str,
        order: OrderSnapshot,
        payload: &CallbackPayload,
    ) -> SettlementResult<CallbackOutcome> {
        let attempt = AttemptDraft {
            gateway_txn_no: payload.gateway_txn_no.clone(),
            response_code: payload.response_code.clone(),
            amount: payload.amount,
            raw_payload: raw_query.to_string(),
        };

        match self.seats.confirm(&order.hold_token) {
            Ok(()) => {
                match self
                    .storage
                    .settle_order(&order.order_id, OrderStatus::Completed, None, attempt)?
                {
                    TransitionOutcome::Applied(snapshot) => {
                        self.storage.append_audit(
                            raw_query,
                            true,
                            Some(&snapshot.order_id),
                            "completed",
                        )?;
                        crate::audit_log!(
                            order_id = %snapshot.order_id,
                            amount = payload.amount,
                            txn_no = payload.gateway_txn_no.as_deref().unwrap_or("-"),
                            "payment confirmed, order completed"
                        );
                        Ok(CallbackOutcome::Completed {
                            order_id: snapshot.order_id,
                        })
                    }
                    TransitionOutcome::StateMismatch(current) => {
                        self.duplicate_audit(raw_query, current)
                    }
                    TransitionOutcome::NotFound => {
                        Err(SettlementError::OrderNotFound(order.order_id))
                    }
                }
            }
            Err(SeatStoreError::HoldExpired) | Err(SeatStoreError::HoldNotFound) => {
                // Money taken, lease lapsed, chairs possibly resold.
                // The order fails with a reason that routes it to
                // manual reconciliation instead of a silent refund gap.
                match self.storage.settle_order(
                    &order.order_id,
                    OrderStatus::Failed,
                    Some(FailureReason::SeatsLostAfterPayment),
                    attempt,
                )? {
                    TransitionOutcome::Applied(snapshot) => {
                        error!(
                            order_id = %snapshot.order_id,
                            amount = payload.amount,
                            "paid order lost its seats, manual reconciliation required"
                        );
                        self.storage.append_audit(
                            raw_query,
                            true,
                            Some(&snapshot.order_id),
                            "seats lost after payment",
                        )?;
                        crate::audit_log!(
                            order_id = %snapshot.order_id,
                            amount = payload.amount,
                            reason = %FailureReason::SeatsLostAfterPayment,
                            "paid order failed"
                        );
                        Ok(CallbackOutcome::Failed {
                            order_id: Some(snapshot.order_id),
                        })
                    }
                    TransitionOutcome::StateMismatch(current) => {
                        self.duplicate_audit(raw_query, current)
                    }
                    TransitionOutcome::NotFound => {
                        Err(SettlementError::OrderNotFound(order.order_id))
                    }
                }
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Decline or mismatch: settle FAILED first, then put the seats
    /// back on sale. Release only happens when this call actually won
    /// the transition; a racing winner keeps control of the seats.
    fn settle_failure(
        &self,
        raw_query: &str,
        order: OrderSnapshot,
        payload: &CallbackPayload,
        reason: FailureReason,
    ) -> SettlementResult<CallbackOutcome> {
        let attempt = AttemptDraft {
            gateway_txn_no: payload.gateway_txn_no.clone(),
            response_code: payload.response_code.clone(),
            amount: payload.amount,
            raw_payload: raw_query.to_string(),
        };

        match self
            .storage
            .settle_order(&order.order_id, OrderStatus::Failed, Some(reason), attempt)?
        {
            TransitionOutcome::Applied(snapshot) => {
                self.seats.release(&snapshot.hold_token)?;
                self.storage.append_audit(
                    raw_query,
                    true,
                    Some(&snapshot.order_id),
                    &format!("failed: {reason}"),
                )?;
                crate::audit_log!(
                    order_id = %snapshot.order_id,
                    reason = %reason,
                    response_code = %payload.response_code,
                    "order failed"
                );
                Ok(CallbackOutcome::Failed {
                    order_id: Some(snapshot.order_id),
                })
            }
            TransitionOutcome::StateMismatch(current) => self.duplicate_audit(raw_query, current),
            TransitionOutcome::NotFound => Err(SettlementError::OrderNotFound(order.order_id)),
        }
    }

    /// Verified callback, PENDING order, and the settlement machinery
    /// itself died. Last resort: settle FAILED with `SETTLEMENT_ERROR`
    /// and hand the order to the reconciliation queue, because nothing
    /// here can prove what happened to the customer's money.
    fn settle_internal_failure(
        &self,
        raw_query: &str,
        order_id: &str,
        payload: &CallbackPayload,
        err: SettlementError,
    ) -> CallbackOutcome {
        error!(order_id = order_id, error = %err, "settlement failed internally");
        let settled = self.storage.settle_order(
            order_id,
            OrderStatus::Failed,
            Some(FailureReason::SettlementError),
            AttemptDraft {
                gateway_txn_no: payload.gateway_txn_no.clone(),
                response_code: payload.response_code.clone(),
                amount: payload.amount,
                raw_payload: raw_query.to_string(),
            },
        );
        if let Err(audit_err) = self.storage.append_audit(
            raw_query,
            true,
            Some(order_id),
            &format!("internal error: {err}"),
        ) {
            error!(error = %audit_err, "callback audit write failed");
        }
        match settled {
            Ok(TransitionOutcome::Applied(snapshot)) => {
                crate::audit_log!(
                    order_id = %snapshot.order_id,
                    reason = %FailureReason::SettlementError,
                    "order failed mid-settlement, manual reconciliation required"
                );
                CallbackOutcome::Failed {
                    order_id: Some(snapshot.order_id),
                }
            }
            // The decision landed before the fault surfaced; echo it.
            Ok(TransitionOutcome::StateMismatch(current)) => Self::recorded_outcome(current),
            Ok(TransitionOutcome::NotFound) => CallbackOutcome::Failed {
                order_id: Some(order_id.to_string()),
            },
            Err(settle_err) => {
                error!(order_id = order_id, error = %settle_err, "last-resort settlement failed");
                CallbackOutcome::Failed {
                    order_id: Some(order_id.to_string()),
                }
            }
        }
    }

    fn duplicate_audit(
        &self,
        raw_query: &str,
        current: OrderSnapshot,
    ) -> SettlementResult<CallbackOutcome> {
        self.storage.append_audit(
            raw_query,
            true,
            Some(&current.order_id),
            &format!("duplicate, order already {}", current.status),
        )?;
        Ok(Self::recorded_outcome(current))
    }

    /// Echo whatever the settled order already says. PRINTED implies a
    /// successful payment in its past.
    fn recorded_outcome(order: OrderSnapshot) -> CallbackOutcome {
        match order.status {
            OrderStatus::Completed | OrderStatus::Printed => CallbackOutcome::Completed {
                order_id: order.order_id,
            },
            _ => CallbackOutcome::Failed {
                order_id: Some(order.order_id),
            },
        }
    }
}
