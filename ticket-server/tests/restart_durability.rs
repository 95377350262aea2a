//! 重启持久性测试 - 关闭进程后状态必须原样回来
//!
//! 同一路径重开 redb 文件，订单、座位、票据和审计都在。

use std::time::Duration;

use ticket_server::seating::{SeatStore, SeatStoreError};
use ticket_server::settlement::OrderStorage;
use ticket_server::settlement::storage::{AttemptDraft, TicketRecord};

use shared::order::{OrderSnapshot, OrderStatus};
use shared::seating::SeatState;
use shared::util::now_millis;

const SHOWTIME: &str = "showtime:1";

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn sold_seats_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seats.redb");

    let token = {
        let store = SeatStore::open(&path).unwrap();
        let hold = store
            .hold(SHOWTIME, &ids(&["chair:a1", "chair:a2"]), "order-1", Duration::from_secs(60))
            .unwrap();
        store.confirm(&hold.token).unwrap();
        hold.token
    };

    // 重开：售出状态和归属原样保留
    let store = SeatStore::open(&path).unwrap();
    let record = store.get_record(SHOWTIME, "chair:a1").unwrap().unwrap();
    assert_eq!(record.state, SeatState::Sold);
    assert_eq!(record.sold_to.as_deref(), Some("order-1"));

    // 已确认的保留依旧幂等可确认
    store.confirm(&token).unwrap();

    // 卖掉的座位抢不到
    let err = store
        .hold(SHOWTIME, &ids(&["chair:a1"]), "guest-2", Duration::from_secs(60))
        .unwrap_err();
    assert!(matches!(err, SeatStoreError::SeatConflict { .. }));
}

#[test]
fn expired_lease_reads_free_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seats.redb");

    {
        let store = SeatStore::open(&path).unwrap();
        store
            .hold(SHOWTIME, &ids(&["chair:b1"]), "guest-1", Duration::from_millis(50))
            .unwrap();
    }
    std::thread::sleep(Duration::from_millis(120));

    // 租约过期：没人清扫也要读出 FREE，且能立刻再次保留
    let store = SeatStore::open(&path).unwrap();
    let views = store.availability(SHOWTIME, &ids(&["chair:b1"])).unwrap();
    assert_eq!(views[0].state, SeatState::Free);
    store
        .hold(SHOWTIME, &ids(&["chair:b1"]), "guest-2", Duration::from_secs(60))
        .expect("lapsed lease must not block a new hold");
}

#[test]
fn settled_orders_and_tickets_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.redb");

    {
        let storage = OrderStorage::open(&path).unwrap();
        let mut snapshot = OrderSnapshot::new("order-9", SHOWTIME, "hold-9");
        snapshot.total_price = 300.0;
        snapshot.discount_price = 30.0;
        snapshot.payment_price = 270.0;
        storage.insert_order(&snapshot).unwrap();

        storage
            .settle_order(
                "order-9",
                OrderStatus::Completed,
                None,
                AttemptDraft {
                    gateway_txn_no: Some("TXN-9".to_string()),
                    response_code: "00".to_string(),
                    amount: 270.0,
                    raw_payload: "responseCode=00&orderId=order-9".to_string(),
                },
            )
            .unwrap();
        storage.append_audit("responseCode=00&orderId=order-9", true, Some("order-9"), "completed").unwrap();
        storage
            .put_ticket(&TicketRecord {
                order_id: "order-9".to_string(),
                nonce: "nonce-9".to_string(),
                issued_at: now_millis(),
                used: false,
                used_at: None,
            })
            .unwrap();
    }

    let storage = OrderStorage::open(&path).unwrap();

    let order = storage.get_order("order-9").unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.payment_price, 270.0);
    assert_eq!(order.gateway_txn_no.as_deref(), Some("TXN-9"));

    let attempts = storage.list_attempts("order-9").unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].attempt_no, 1);

    let audits = storage.audit_entries().unwrap();
    assert_eq!(audits.len(), 1);
    assert!(audits[0].signature_ok);

    let ticket = storage.get_ticket("order-9").unwrap().unwrap();
    assert_eq!(ticket.nonce, "nonce-9");
    assert!(!ticket.used);

    // 重开后状态机继续工作：核销照常
    let outcome = storage.consume_ticket("order-9", "nonce-9").unwrap();
    assert!(matches!(
        outcome,
        ticket_server::settlement::storage::ConsumeOutcome::Consumed(_)
    ));
    let order = storage.get_order("order-9").unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Printed);
}

#[test]
fn audit_sequence_continues_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.redb");

    {
        let storage = OrderStorage::open(&path).unwrap();
        storage.append_audit("q=1", false, None, "rejected: bad signature").unwrap();
        storage.append_audit("q=2", true, Some("order-x"), "unknown order").unwrap();
    }

    let storage = OrderStorage::open(&path).unwrap();
    storage.append_audit("q=3", true, Some("order-x"), "completed").unwrap();

    let audits = storage.audit_entries().unwrap();
    let seqs: Vec<u64> = audits.iter().map(|a| a.seq).collect();
    // 序号跨重启单调递增，审计链不断档
    assert_eq!(seqs, vec![1, 2, 3]);
}
