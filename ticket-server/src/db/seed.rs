//! Demo catalog seeding
//!
//! Writes a small but complete catalog (one room's chair grid, two
//! showtimes, combos, vouchers) so a fresh checkout serves real data.
//! Idempotent: runs only when the showtime table is empty.

use crate::db::Catalog;
use crate::db::models::{ChairCreate, ComboCreate, ShowtimeCreate, VoucherCreate};
use crate::db::repository::RepoResult;
use shared::order::SeatClass;
use shared::util::now_millis;
use surrealdb::RecordId;
use tracing::info;

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Chair rows seeded per room: (row letter, class, price).
const ROWS: &[(&str, SeatClass, f64)] = &[
    ("a", SeatClass::Standard, 100.0),
    ("b", SeatClass::Vip, 150.0),
    ("c", SeatClass::Couple, 200.0),
];
const SEATS_PER_ROW: u32 = 5;

#[derive(Debug, Default)]
pub struct SeedSummary {
    pub showtimes: usize,
    pub chairs: usize,
    pub combos: usize,
    pub vouchers: usize,
}

/// Seed the demo catalog when it is empty. Returns `None` when data was
/// already present.
pub async fn seed_if_empty(catalog: &Catalog) -> RepoResult<Option<SeedSummary>> {
    if !catalog.showtimes.find_all().await?.is_empty() {
        return Ok(None);
    }

    let now = now_millis();
    let room = RecordId::from_table_key("room", "r1");
    let mut summary = SeedSummary::default();

    for (row, class, price) in ROWS {
        for n in 1..=SEATS_PER_ROW {
            let key = format!("r1{}{}", row, n);
            catalog
                .chairs
                .create_with_key(
                    &key,
                    ChairCreate {
                        name: format!("{}{}", row.to_uppercase(), n),
                        room: room.clone(),
                        class: *class,
                        price: *price,
                    },
                )
                .await?;
            summary.chairs += 1;
        }
    }

    catalog
        .showtimes
        .create_with_key(
            "1",
            ShowtimeCreate {
                movie_title: "Interstellar (IMAX)".to_string(),
                room: room.clone(),
                starts_at: now + 3 * HOUR_MS,
                ends_at: now + 6 * HOUR_MS,
            },
        )
        .await?;
    catalog
        .showtimes
        .create_with_key(
            "2",
            ShowtimeCreate {
                movie_title: "Spirited Away".to_string(),
                room: room.clone(),
                starts_at: now + DAY_MS,
                ends_at: now + DAY_MS + 2 * HOUR_MS,
            },
        )
        .await?;
    summary.showtimes = 2;

    catalog
        .combos
        .create_with_key(
            "popcorn",
            ComboCreate {
                name: "Popcorn + Cola".to_string(),
                description: Some("Large popcorn with two colas".to_string()),
                price: 50.0,
            },
        )
        .await?;
    catalog
        .combos
        .create_with_key(
            "family",
            ComboCreate {
                name: "Family Snack Box".to_string(),
                description: Some("Popcorn, nachos and four drinks".to_string()),
                price: 80.0,
            },
        )
        .await?;
    summary.combos = 2;

    catalog
        .vouchers
        .create_with_key(
            "save10",
            VoucherCreate {
                code: "SAVE10".to_string(),
                rate: 0.10,
                max_value: 1000.0,
                start_at: now - DAY_MS,
                end_at: now + 30 * DAY_MS,
            },
        )
        .await?;
    catalog
        .vouchers
        .create_with_key(
            "expired10",
            VoucherCreate {
                code: "EXPIRED10".to_string(),
                rate: 0.10,
                max_value: 1000.0,
                start_at: now - 30 * DAY_MS,
                end_at: now - DAY_MS,
            },
        )
        .await?;
    summary.vouchers = 2;

    info!(
        showtimes = summary.showtimes,
        chairs = summary.chairs,
        combos = summary.combos,
        vouchers = summary.vouchers,
        "demo catalog seeded"
    );
    Ok(Some(summary))
}
