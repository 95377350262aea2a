//! Durable order settlement storage (redb)
//!
//! 数据表结构：
//!
//! | Table | Key | Value |
//! |-------|-----|-------|
//! | `orders` | order_id | `OrderSnapshot` JSON |
//! | `payment_attempts` | `(order_id, attempt_no)` | `PaymentAttempt` JSON |
//! | `callback_audit` | seq (u64) | `CallbackAudit` JSON |
//! | `tickets` | order_id | `TicketRecord` JSON |
//! | `counters` | counter name | u64 |
//!
//! The order status field is the settlement idempotency token: every
//! transition re-reads the snapshot INSIDE its write transaction and
//! applies only when the persisted status still matches. Racing writers
//! serialize on redb's single write transaction; the loser observes the
//! already-transitioned state and backs off without writing.

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use shared::order::{FailureReason, OrderSnapshot, OrderStatus, PaymentAttempt};
use shared::util::now_millis;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// order_id -> OrderSnapshot
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// (order_id, attempt_no) -> PaymentAttempt
const ATTEMPTS_TABLE: TableDefinition<(&str, u64), &[u8]> =
    TableDefinition::new("payment_attempts");

/// monotonic seq -> CallbackAudit
const AUDIT_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("callback_audit");

/// order_id -> TicketRecord
const TICKETS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("tickets");

/// counter name -> next value
const COUNTERS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("counters");

const AUDIT_SEQ: &str = "callback_audit_seq";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ============================================================================
// Records
// ============================================================================

/// One received gateway callback, recorded verbatim BEFORE any decision
/// is acted on. Signature failures land here too; that is the point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallbackAudit {
    pub seq: u64,
    pub received_at: i64,
    /// Raw query string exactly as delivered
    pub raw_query: String,
    pub signature_ok: bool,
    /// Order reference when one could be extracted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// What the handler decided (duplicate, completed, declined, ...)
    pub note: String,
}

/// Entry ticket consumption state for one order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketRecord {
    pub order_id: String,
    /// Current nonce; re-issuing rotates it and invalidates older payloads
    pub nonce: String,
    pub issued_at: i64,
    #[serde(default)]
    pub used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_at: Option<i64>,
}

/// Attempt fields the settlement decision carries into the transaction.
#[derive(Debug, Clone)]
pub struct AttemptDraft {
    pub gateway_txn_no: Option<String>,
    pub response_code: String,
    pub amount: f64,
    pub raw_payload: String,
}

/// Outcome of a state-checked transition.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// Transition applied; carries the new snapshot
    Applied(OrderSnapshot),
    /// Persisted status did not match; nothing written. Carries the
    /// snapshot that was found instead.
    StateMismatch(OrderSnapshot),
    NotFound,
}

/// Outcome of an atomic ticket consumption.
#[derive(Debug, Clone)]
pub enum ConsumeOutcome {
    /// Ticket flipped to used and order moved to PRINTED in one commit
    Consumed(OrderSnapshot),
    AlreadyUsed { used_at: Option<i64> },
    /// Payload nonce does not match the current ticket (stale re-issue)
    NonceMismatch,
    NoTicket,
    OrderNotFound,
    WrongState(OrderStatus),
}

/// Row counts for diagnostics and the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StorageStats {
    pub orders: u64,
    pub payment_attempts: u64,
    pub tickets: u64,
    pub audit_entries: u64,
}

// ============================================================================
// Store
// ============================================================================

/// Order settlement storage. Cheap to clone; clones share one database.
#[derive(Clone)]
pub struct OrderStorage {
    db: Arc<Database>,
}

impl OrderStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = Database::create(path)?;
        let storage = Self { db: Arc::new(db) };
        storage.ensure_tables()?;
        info!("order storage opened");
        Ok(storage)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())?;
        let storage = Self { db: Arc::new(db) };
        storage.ensure_tables()?;
        Ok(storage)
    }

    fn ensure_tables(&self) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write()?;
        {
            write_txn.open_table(ORDERS_TABLE)?;
            write_txn.open_table(ATTEMPTS_TABLE)?;
            write_txn.open_table(AUDIT_TABLE)?;
            write_txn.open_table(TICKETS_TABLE)?;
            write_txn.open_table(COUNTERS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // ========== Orders ==========

    /// Persist a freshly assembled snapshot. Ids are minted uuids, so
    /// plain insert semantics are enough.
    pub fn insert_order(&self, snapshot: &OrderSnapshot) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut orders = write_txn.open_table(ORDERS_TABLE)?;
            let bytes = serde_json::to_vec(snapshot)?;
            orders.insert(snapshot.order_id.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        debug!(order_id = %snapshot.order_id, "order persisted");
        Ok(())
    }

    pub fn get_order(&self, order_id: &str) -> Result<Option<OrderSnapshot>, StorageError> {
        let read_txn = self.db.begin_read()?;
        let orders = read_txn.open_table(ORDERS_TABLE)?;
        match orders.get(order_id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Settle a PENDING order to `COMPLETED` or `FAILED`, recording the
    /// payment attempt row in the same transaction.
    ///
    /// The status check runs on the value read INSIDE this write
    /// transaction; a concurrent duplicate callback therefore observes
    /// `StateMismatch` with the winner's snapshot and writes nothing.
    pub fn settle_order(
        &self,
        order_id: &str,
        new_status: OrderStatus,
        failure_reason: Option<FailureReason>,
        attempt: AttemptDraft,
    ) -> Result<TransitionOutcome, StorageError> {
        let now = now_millis();
        let write_txn = self.db.begin_write()?;
        let outcome;
        {
            let mut orders = write_txn.open_table(ORDERS_TABLE)?;
            let mut snapshot: OrderSnapshot = match orders.get(order_id)? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => return Ok(TransitionOutcome::NotFound),
            };
            if snapshot.status != OrderStatus::Pending {
                return Ok(TransitionOutcome::StateMismatch(snapshot));
            }

            snapshot.status = new_status;
            snapshot.failure_reason = failure_reason;
            snapshot.gateway_txn_no = attempt.gateway_txn_no.clone();
            snapshot.updated_at = now;
            if new_status == OrderStatus::Completed {
                snapshot.completed_at = Some(now);
            }
            let bytes = serde_json::to_vec(&snapshot)?;
            orders.insert(order_id, bytes.as_slice())?;

            let mut attempts = write_txn.open_table(ATTEMPTS_TABLE)?;
            let attempt_no = {
                let mut count = 0u64;
                for entry in attempts.range((order_id, 0)..=(order_id, u64::MAX))? {
                    entry?;
                    count += 1;
                }
                count + 1
            };
            let record = PaymentAttempt {
                order_id: order_id.to_string(),
                attempt_no,
                gateway_txn_no: attempt.gateway_txn_no,
                response_code: attempt.response_code,
                amount: attempt.amount,
                raw_payload: attempt.raw_payload,
                received_at: now,
            };
            let bytes = serde_json::to_vec(&record)?;
            attempts.insert((order_id, attempt_no), bytes.as_slice())?;

            outcome = TransitionOutcome::Applied(snapshot);
        }
        write_txn.commit()?;
        Ok(outcome)
    }

    /// Cancel a PENDING order (customer abandonment). State-checked the
    /// same way as settlement; no attempt row is written.
    pub fn cancel_order(&self, order_id: &str) -> Result<TransitionOutcome, StorageError> {
        let now = now_millis();
        let write_txn = self.db.begin_write()?;
        let outcome;
        {
            let mut orders = write_txn.open_table(ORDERS_TABLE)?;
            let mut snapshot: OrderSnapshot = match orders.get(order_id)? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => return Ok(TransitionOutcome::NotFound),
            };
            if snapshot.status != OrderStatus::Pending {
                return Ok(TransitionOutcome::StateMismatch(snapshot));
            }
            snapshot.status = OrderStatus::Canceled;
            snapshot.updated_at = now;
            let bytes = serde_json::to_vec(&snapshot)?;
            orders.insert(order_id, bytes.as_slice())?;
            outcome = TransitionOutcome::Applied(snapshot);
        }
        write_txn.commit()?;
        Ok(outcome)
    }

    /// Orders settled FAILED with a reason an operator must reconcile.
    pub fn orders_needing_reconciliation(&self) -> Result<Vec<OrderSnapshot>, StorageError> {
        let read_txn = self.db.begin_read()?;
        let orders = read_txn.open_table(ORDERS_TABLE)?;
        let mut found = Vec::new();
        for entry in orders.iter()? {
            let (_, value) = entry?;
            let snapshot: OrderSnapshot = serde_json::from_slice(value.value())?;
            let flagged = snapshot.status == OrderStatus::Failed
                && snapshot
                    .failure_reason
                    .map(|r| r.needs_reconciliation())
                    .unwrap_or(false);
            if flagged {
                found.push(snapshot);
            }
        }
        Ok(found)
    }

    // ========== Payment attempts ==========

    pub fn list_attempts(&self, order_id: &str) -> Result<Vec<PaymentAttempt>, StorageError> {
        let read_txn = self.db.begin_read()?;
        let attempts = read_txn.open_table(ATTEMPTS_TABLE)?;
        let mut found = Vec::new();
        for entry in attempts.range((order_id, 0)..=(order_id, u64::MAX))? {
            let (_, value) = entry?;
            found.push(serde_json::from_slice(value.value())?);
        }
        Ok(found)
    }

    // ========== Callback audit ==========

    /// Append a raw callback to the audit trail. Runs in its own
    /// transaction: the audit row must survive even when the settlement
    /// decision afterwards goes nowhere.
    pub fn append_audit(
        &self,
        raw_query: &str,
        signature_ok: bool,
        order_id: Option<&str>,
        note: &str,
    ) -> Result<u64, StorageError> {
        let write_txn = self.db.begin_write()?;
        let seq;
        {
            let mut counters = write_txn.open_table(COUNTERS_TABLE)?;
            seq = match counters.get(AUDIT_SEQ)? {
                Some(guard) => guard.value() + 1,
                None => 1,
            };
            counters.insert(AUDIT_SEQ, seq)?;

            let record = CallbackAudit {
                seq,
                received_at: now_millis(),
                raw_query: raw_query.to_string(),
                signature_ok,
                order_id: order_id.map(|s| s.to_string()),
                note: note.to_string(),
            };
            let mut audit = write_txn.open_table(AUDIT_TABLE)?;
            let bytes = serde_json::to_vec(&record)?;
            audit.insert(seq, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(seq)
    }

    pub fn audit_entries(&self) -> Result<Vec<CallbackAudit>, StorageError> {
        let read_txn = self.db.begin_read()?;
        let audit = read_txn.open_table(AUDIT_TABLE)?;
        let mut found = Vec::new();
        for entry in audit.iter()? {
            let (_, value) = entry?;
            found.push(serde_json::from_slice(value.value())?);
        }
        Ok(found)
    }

    // ========== Tickets ==========

    /// Store (or rotate) the ticket record for an order.
    pub fn put_ticket(&self, record: &TicketRecord) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut tickets = write_txn.open_table(TICKETS_TABLE)?;
            let bytes = serde_json::to_vec(record)?;
            tickets.insert(record.order_id.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_ticket(&self, order_id: &str) -> Result<Option<TicketRecord>, StorageError> {
        let read_txn = self.db.begin_read()?;
        let tickets = read_txn.open_table(TICKETS_TABLE)?;
        match tickets.get(order_id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Atomically consume a ticket: re-check everything against the
    /// values INSIDE this transaction, flip `used`, and move the order
    /// `COMPLETED -> PRINTED` in the same commit. Exactly one of two
    /// racing calls can observe `used == false`.
    pub fn consume_ticket(
        &self,
        order_id: &str,
        expected_nonce: &str,
    ) -> Result<ConsumeOutcome, StorageError> {
        let now = now_millis();
        let write_txn = self.db.begin_write()?;
        let outcome;
        {
            let mut tickets = write_txn.open_table(TICKETS_TABLE)?;
            let mut ticket: TicketRecord = match tickets.get(order_id)? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => return Ok(ConsumeOutcome::NoTicket),
            };
            if ticket.nonce != expected_nonce {
                return Ok(ConsumeOutcome::NonceMismatch);
            }
            if ticket.used {
                return Ok(ConsumeOutcome::AlreadyUsed {
                    used_at: ticket.used_at,
                });
            }

            let mut orders = write_txn.open_table(ORDERS_TABLE)?;
            let mut snapshot: OrderSnapshot = match orders.get(order_id)? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => return Ok(ConsumeOutcome::OrderNotFound),
            };
            if snapshot.status != OrderStatus::Completed {
                return Ok(ConsumeOutcome::WrongState(snapshot.status));
            }

            ticket.used = true;
            ticket.used_at = Some(now);
            let bytes = serde_json::to_vec(&ticket)?;
            tickets.insert(order_id, bytes.as_slice())?;

            snapshot.status = OrderStatus::Printed;
            snapshot.printed_at = Some(now);
            snapshot.updated_at = now;
            let bytes = serde_json::to_vec(&snapshot)?;
            orders.insert(order_id, bytes.as_slice())?;

            outcome = ConsumeOutcome::Consumed(snapshot);
        }
        write_txn.commit()?;
        debug!(order_id = order_id, "ticket consumed, order printed");
        Ok(outcome)
    }

    // ========== Stats ==========

    pub fn stats(&self) -> Result<StorageStats, StorageError> {
        use redb::ReadableTableMetadata;
        let read_txn = self.db.begin_read()?;
        Ok(StorageStats {
            orders: read_txn.open_table(ORDERS_TABLE)?.len()?,
            payment_attempts: read_txn.open_table(ATTEMPTS_TABLE)?.len()?,
            tickets: read_txn.open_table(TICKETS_TABLE)?.len()?,
            audit_entries: read_txn.open_table(AUDIT_TABLE)?.len()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_storage() -> OrderStorage {
        OrderStorage::open_in_memory().unwrap()
    }

    fn pending_order(order_id: &str) -> OrderSnapshot {
        let mut snapshot = OrderSnapshot::new(order_id, "showtime:1", "hold-1");
        snapshot.total_price = 300.0;
        snapshot.payment_price = 270.0;
        snapshot.discount_price = 30.0;
        snapshot
    }

    fn success_attempt(amount: f64) -> AttemptDraft {
        AttemptDraft {
            gateway_txn_no: Some("GW-123".to_string()),
            response_code: "00".to_string(),
            amount,
            raw_payload: "amount=270&orderId=o-1&responseCode=00".to_string(),
        }
    }

    #[test]
    fn insert_and_get_round_trip() {
        let storage = test_storage();
        let order = pending_order("o-1");
        storage.insert_order(&order).unwrap();
        let loaded = storage.get_order("o-1").unwrap().unwrap();
        assert_eq!(loaded, order);
        assert!(storage.get_order("o-2").unwrap().is_none());
    }

    #[test]
    fn settle_applies_once_then_mismatches() {
        let storage = test_storage();
        storage.insert_order(&pending_order("o-1")).unwrap();

        let first = storage
            .settle_order("o-1", OrderStatus::Completed, None, success_attempt(270.0))
            .unwrap();
        let snapshot = match first {
            TransitionOutcome::Applied(s) => s,
            other => panic!("expected Applied, got {other:?}"),
        };
        assert_eq!(snapshot.status, OrderStatus::Completed);
        assert!(snapshot.completed_at.is_some());
        assert_eq!(snapshot.gateway_txn_no.as_deref(), Some("GW-123"));

        // A duplicate settle observes the already-completed state and
        // writes neither the order nor a second attempt row.
        let second = storage
            .settle_order("o-1", OrderStatus::Completed, None, success_attempt(270.0))
            .unwrap();
        assert!(matches!(
            second,
            TransitionOutcome::StateMismatch(ref s) if s.status == OrderStatus::Completed
        ));
        assert_eq!(storage.list_attempts("o-1").unwrap().len(), 1);
    }

    #[test]
    fn settle_failed_keeps_reason() {
        let storage = test_storage();
        storage.insert_order(&pending_order("o-2")).unwrap();
        let outcome = storage
            .settle_order(
                "o-2",
                OrderStatus::Failed,
                Some(FailureReason::SeatsLostAfterPayment),
                success_attempt(270.0),
            )
            .unwrap();
        match outcome {
            TransitionOutcome::Applied(s) => {
                assert_eq!(s.status, OrderStatus::Failed);
                assert_eq!(s.failure_reason, Some(FailureReason::SeatsLostAfterPayment));
                assert!(s.completed_at.is_none());
            }
            other => panic!("expected Applied, got {other:?}"),
        }
        let flagged = storage.orders_needing_reconciliation().unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].order_id, "o-2");
    }

    #[test]
    fn reconciliation_queue_holds_unproven_money_only() {
        let storage = test_storage();
        storage.insert_order(&pending_order("o-err")).unwrap();
        storage.insert_order(&pending_order("o-declined")).unwrap();

        storage
            .settle_order(
                "o-err",
                OrderStatus::Failed,
                Some(FailureReason::SettlementError),
                success_attempt(270.0),
            )
            .unwrap();
        storage
            .settle_order(
                "o-declined",
                OrderStatus::Failed,
                Some(FailureReason::GatewayDeclined),
                success_attempt(270.0),
            )
            .unwrap();

        let flagged = storage.orders_needing_reconciliation().unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].order_id, "o-err");
    }

    #[test]
    fn attempt_rows_number_sequentially_per_order() {
        let storage = test_storage();
        storage.insert_order(&pending_order("o-3")).unwrap();
        storage.insert_order(&pending_order("o-4")).unwrap();

        storage
            .settle_order("o-3", OrderStatus::Failed, Some(FailureReason::GatewayDeclined), success_attempt(270.0))
            .unwrap();
        storage
            .settle_order("o-4", OrderStatus::Completed, None, success_attempt(270.0))
            .unwrap();

        let attempts = storage.list_attempts("o-3").unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].attempt_no, 1);
        assert_eq!(storage.list_attempts("o-4").unwrap().len(), 1);
    }

    #[test]
    fn cancel_only_from_pending() {
        let storage = test_storage();
        storage.insert_order(&pending_order("o-5")).unwrap();
        assert!(matches!(
            storage.cancel_order("o-5").unwrap(),
            TransitionOutcome::Applied(ref s) if s.status == OrderStatus::Canceled
        ));
        assert!(matches!(
            storage.cancel_order("o-5").unwrap(),
            TransitionOutcome::StateMismatch(_)
        ));
        assert!(matches!(
            storage.cancel_order("nope").unwrap(),
            TransitionOutcome::NotFound
        ));
    }

    #[test]
    fn audit_trail_appends_with_sequence() {
        let storage = test_storage();
        let first = storage
            .append_audit("sig=bad", false, None, "signature rejected")
            .unwrap();
        let second = storage
            .append_audit("responseCode=00", true, Some("o-1"), "completed")
            .unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);

        let entries = storage.audit_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(!entries[0].signature_ok);
        assert_eq!(entries[1].order_id.as_deref(), Some("o-1"));
    }

    #[test]
    fn consume_ticket_happy_path_then_already_used() {
        let storage = test_storage();
        let mut order = pending_order("o-6");
        order.status = OrderStatus::Completed;
        storage.insert_order(&order).unwrap();
        storage
            .put_ticket(&TicketRecord {
                order_id: "o-6".to_string(),
                nonce: "n1".to_string(),
                issued_at: now_millis(),
                used: false,
                used_at: None,
            })
            .unwrap();

        match storage.consume_ticket("o-6", "n1").unwrap() {
            ConsumeOutcome::Consumed(snapshot) => {
                assert_eq!(snapshot.status, OrderStatus::Printed);
                assert!(snapshot.printed_at.is_some());
            }
            other => panic!("expected Consumed, got {other:?}"),
        }

        // Deterministically AlreadyUsed afterwards, even though the
        // order has moved on to PRINTED.
        assert!(matches!(
            storage.consume_ticket("o-6", "n1").unwrap(),
            ConsumeOutcome::AlreadyUsed { .. }
        ));
    }

    #[test]
    fn consume_rejects_stale_nonce_and_wrong_state() {
        let storage = test_storage();
        let order = pending_order("o-7"); // still PENDING
        storage.insert_order(&order).unwrap();
        storage
            .put_ticket(&TicketRecord {
                order_id: "o-7".to_string(),
                nonce: "n2".to_string(),
                issued_at: now_millis(),
                used: false,
                used_at: None,
            })
            .unwrap();

        assert!(matches!(
            storage.consume_ticket("o-7", "old-nonce").unwrap(),
            ConsumeOutcome::NonceMismatch
        ));
        assert!(matches!(
            storage.consume_ticket("o-7", "n2").unwrap(),
            ConsumeOutcome::WrongState(OrderStatus::Pending)
        ));
        assert!(matches!(
            storage.consume_ticket("o-8", "n").unwrap(),
            ConsumeOutcome::NoTicket
        ));
    }

    #[test]
    fn stats_count_rows() {
        let storage = test_storage();
        storage.insert_order(&pending_order("o-9")).unwrap();
        storage.append_audit("q", true, None, "note").unwrap();
        let stats = storage.stats().unwrap();
        assert_eq!(stats.orders, 1);
        assert_eq!(stats.audit_entries, 1);
        assert_eq!(stats.payment_attempts, 0);
    }
}
