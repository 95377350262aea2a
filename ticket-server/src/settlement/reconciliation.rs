//! Periodic reconciliation reporter
//!
//! Orders settled FAILED with `SEATS_LOST_AFTER_PAYMENT` or
//! `SETTLEMENT_ERROR` may hold customer money with nothing to show for
//! it. They are terminal as far as the state machine goes; resolving
//! them (refund or manual re-seating) is an operator decision. This
//! worker keeps them loud until someone deals with them.

use crate::settlement::storage::OrderStorage;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct ReconciliationReporter {
    storage: OrderStorage,
    interval: Duration,
    shutdown: CancellationToken,
}

impl ReconciliationReporter {
    pub fn new(storage: OrderStorage, interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            storage,
            interval,
            shutdown,
        }
    }

    pub async fn run(self) {
        info!(
            interval_secs = self.interval.as_secs(),
            "reconciliation reporter started"
        );
        loop {
            tokio::select! {
                _ = sleep(self.interval) => {
                    self.scan_once();
                }
                _ = self.shutdown.cancelled() => {
                    info!("reconciliation reporter stopped");
                    return;
                }
            }
        }
    }

    fn scan_once(&self) {
        match self.storage.orders_needing_reconciliation() {
            Ok(orders) if orders.is_empty() => {}
            Ok(orders) => {
                for order in &orders {
                    warn!(
                        target: "audit",
                        order_id = %order.order_id,
                        amount = order.payment_price,
                        "order awaiting manual reconciliation"
                    );
                }
                warn!(count = orders.len(), "paid-but-failed orders outstanding");
            }
            Err(err) => error!(error = %err, "reconciliation scan failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{FailureReason, OrderSnapshot, OrderStatus};
    use shared::util::now_millis;

    #[tokio::test]
    async fn reporter_stops_on_shutdown() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let mut lost = OrderSnapshot::new("o-lost", "showtime:1", "h-1");
        lost.status = OrderStatus::Failed;
        lost.failure_reason = Some(FailureReason::SeatsLostAfterPayment);
        lost.updated_at = now_millis();
        storage.insert_order(&lost).unwrap();

        let shutdown = CancellationToken::new();
        let reporter = ReconciliationReporter::new(
            storage,
            Duration::from_millis(10),
            shutdown.clone(),
        );
        let handle = tokio::spawn(reporter.run());

        tokio::time::sleep(Duration::from_millis(40)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("reporter should stop promptly")
            .unwrap();
    }
}
