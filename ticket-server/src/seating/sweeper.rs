//! Periodic reclamation of expired seat holds
//!
//! Lazy expiry already makes lapsed leases invisible to readers; this
//! loop just returns their chairs to `FREE` and prunes old confirmed
//! hold records so the tables do not grow without bound.

use crate::seating::store::SeatStore;
use shared::util::now_millis;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct HoldSweeper {
    store: SeatStore,
    interval: Duration,
    shutdown: CancellationToken,
}

impl HoldSweeper {
    pub fn new(store: SeatStore, interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            store,
            interval,
            shutdown,
        }
    }

    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "hold sweeper started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    match self.store.sweep_expired(now_millis()) {
                        Ok(outcome) if outcome.released_holds > 0 || outcome.pruned_confirmed > 0 => {
                            info!(
                                released = outcome.released_holds,
                                freed_chairs = outcome.freed_chairs,
                                pruned = outcome.pruned_confirmed,
                                "expired holds reclaimed"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "hold sweep failed"),
                    }
                }
                _ = self.shutdown.cancelled() => {
                    info!("hold sweeper stopped");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sweeper_reclaims_and_stops_on_cancel() {
        let store = SeatStore::open_in_memory().unwrap();
        store
            .hold(
                "showtime:1",
                &["A1".to_string()],
                "sel",
                Duration::from_millis(1),
            )
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let shutdown = CancellationToken::new();
        let sweeper = HoldSweeper::new(store.clone(), Duration::from_millis(10), shutdown.clone());
        let handle = tokio::spawn(sweeper.run());

        tokio::time::sleep(Duration::from_millis(60)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let views = store.availability("showtime:1", &["A1".to_string()]).unwrap();
        assert_eq!(views[0].state, shared::seating::SeatState::Free);
        // The hold record itself is gone, not just invisible.
        assert!(store.get_hold("A1").unwrap().is_none());
    }
}
