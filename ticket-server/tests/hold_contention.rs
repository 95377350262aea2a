//! 并发争用测试 - 多线程抢座/重复结算/重复核销
//!
//! 直接压存储层：redb 单写者事务下，同一资源的竞争操作恰好一个赢。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use ticket_server::seating::{SeatStore, SeatStoreError};
use ticket_server::settlement::OrderStorage;
use ticket_server::settlement::storage::{AttemptDraft, ConsumeOutcome, TicketRecord, TransitionOutcome};

use shared::order::{OrderSnapshot, OrderStatus};
use shared::seating::SeatState;
use shared::util::now_millis;

const SHOWTIME: &str = "showtime:race";
const TTL: Duration = Duration::from_secs(60);

fn seat_store(dir: &std::path::Path) -> SeatStore {
    SeatStore::open(dir.join("seats.redb")).expect("store opens")
}

fn chairs(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

#[test]
fn overlapping_holds_have_exactly_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let store = seat_store(dir.path());
    let wanted = chairs(&["chair:x1", "chair:x2"]);

    let barrier = Arc::new(Barrier::new(2));
    let mut handles = Vec::new();
    for i in 0..2 {
        let store = store.clone();
        let wanted = wanted.clone();
        let barrier = barrier.clone();
        handles.push(std::thread::spawn(move || {
            barrier.wait();
            store.hold(SHOWTIME, &wanted, &format!("guest-{i}"), TTL)
        }));
    }

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one hold must win");

    let loser = results.iter().find(|r| r.is_err()).unwrap();
    match loser {
        Err(SeatStoreError::SeatConflict { chairs }) => {
            // 冲突列表点名每一张争用座位
            assert_eq!(chairs, &wanted);
        }
        other => panic!("loser should see SeatConflict, got {other:?}"),
    }
}

#[test]
fn contended_rounds_never_double_hold() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 20;

    let dir = tempfile::tempdir().unwrap();
    let store = seat_store(dir.path());
    let wanted = chairs(&["chair:y1", "chair:y2", "chair:y3"]);

    for round in 0..ROUNDS {
        let barrier = Arc::new(Barrier::new(THREADS));
        let winners = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for t in 0..THREADS {
            let store = store.clone();
            let wanted = wanted.clone();
            let barrier = barrier.clone();
            let winners = winners.clone();
            handles.push(std::thread::spawn(move || {
                barrier.wait();
                match store.hold(SHOWTIME, &wanted, &format!("r{round}-t{t}"), TTL) {
                    Ok(hold) => {
                        winners.fetch_add(1, Ordering::SeqCst);
                        Some(hold.token)
                    }
                    Err(SeatStoreError::SeatConflict { .. }) => None,
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }));
        }

        let tokens: Vec<_> = handles.into_iter().filter_map(|h| h.join().unwrap()).collect();
        assert_eq!(winners.load(Ordering::SeqCst), 1, "round {round}");
        assert_eq!(tokens.len(), 1);

        // 胜者释放，下一轮重新抢
        store.release(&tokens[0]).unwrap();
    }
}

#[test]
fn racing_confirms_converge_without_double_bump() {
    let dir = tempfile::tempdir().unwrap();
    let store = seat_store(dir.path());
    let hold = store
        .hold(SHOWTIME, &chairs(&["chair:z1"]), "order-42", TTL)
        .unwrap();
    let before = store.get_record(SHOWTIME, "chair:z1").unwrap().unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let mut handles = Vec::new();
    for _ in 0..2 {
        let store = store.clone();
        let token = hold.token.clone();
        let barrier = barrier.clone();
        handles.push(std::thread::spawn(move || {
            barrier.wait();
            store.confirm(&token)
        }));
    }
    for h in handles {
        // 确认是幂等的：两边都成功
        h.join().unwrap().expect("confirm converges");
    }

    let after = store.get_record(SHOWTIME, "chair:z1").unwrap().unwrap();
    assert_eq!(after.state, SeatState::Sold);
    assert_eq!(after.sold_to.as_deref(), Some("order-42"));
    // 状态只前进了一次
    assert_eq!(after.version, before.version + 1);
}

fn completed_order(storage: &OrderStorage, order_id: &str) {
    let mut snapshot = OrderSnapshot::new(order_id, SHOWTIME, "hold-token");
    snapshot.status = OrderStatus::Completed;
    snapshot.completed_at = Some(now_millis());
    storage.insert_order(&snapshot).unwrap();
}

fn attempt(code: &str, amount: f64) -> AttemptDraft {
    AttemptDraft {
        gateway_txn_no: Some("TXN-RACE".to_string()),
        response_code: code.to_string(),
        amount,
        raw_payload: format!("responseCode={code}"),
    }
}

#[test]
fn racing_settlements_apply_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let storage = OrderStorage::open(dir.path().join("orders.redb")).unwrap();
    let snapshot = OrderSnapshot::new("order-race", SHOWTIME, "hold-token");
    storage.insert_order(&snapshot).unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let mut handles = Vec::new();
    for _ in 0..2 {
        let storage = storage.clone();
        let barrier = barrier.clone();
        handles.push(std::thread::spawn(move || {
            barrier.wait();
            storage.settle_order("order-race", OrderStatus::Completed, None, attempt("00", 100.0))
        }));
    }

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect();
    let applied = results
        .iter()
        .filter(|r| matches!(r, TransitionOutcome::Applied(_)))
        .count();
    let mismatched = results
        .iter()
        .filter(|r| matches!(r, TransitionOutcome::StateMismatch(_)))
        .count();
    assert_eq!((applied, mismatched), (1, 1));

    // 败者不留支付记录
    let attempts = storage.list_attempts("order-race").unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].attempt_no, 1);
}

#[test]
fn racing_ticket_consumers_single_winner() {
    let dir = tempfile::tempdir().unwrap();
    let storage = OrderStorage::open(dir.path().join("orders.redb")).unwrap();
    completed_order(&storage, "order-door");
    storage
        .put_ticket(&TicketRecord {
            order_id: "order-door".to_string(),
            nonce: "nonce-1".to_string(),
            issued_at: now_millis(),
            used: false,
            used_at: None,
        })
        .unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let mut handles = Vec::new();
    for _ in 0..2 {
        let storage = storage.clone();
        let barrier = barrier.clone();
        handles.push(std::thread::spawn(move || {
            barrier.wait();
            storage.consume_ticket("order-door", "nonce-1")
        }));
    }

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect();
    let consumed = results
        .iter()
        .filter(|r| matches!(r, ConsumeOutcome::Consumed(_)))
        .count();
    let already_used = results
        .iter()
        .filter(|r| matches!(r, ConsumeOutcome::AlreadyUsed { .. }))
        .count();
    // 两台闸机同时扫码：恰好一台放行
    assert_eq!((consumed, already_used), (1, 1));

    let order = storage.get_order("order-door").unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Printed);
    assert!(order.printed_at.is_some());
}
