//! Catalog models (SurrealDB)

pub mod chair;
pub mod combo;
pub mod serde_helpers;
pub mod showtime;
pub mod voucher;

// Re-exports
pub use chair::{Chair, ChairCreate};
pub use combo::{Combo, ComboCreate};
pub use showtime::{Showtime, ShowtimeCreate};
pub use voucher::{Voucher, VoucherCreate};
