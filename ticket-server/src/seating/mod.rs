//! Seat availability: versioned per-(showtime, chair) records, atomic
//! multi-chair holds with TTL leases, and the background sweeper.

pub mod store;
pub mod sweeper;

pub use store::{
    AvailabilityVersions, ChairAvailability, SeatHold, SeatStore, SeatStoreError, SweepOutcome,
};
pub use sweeper::HoldSweeper;
