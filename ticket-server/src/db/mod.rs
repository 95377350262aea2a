//! Catalog database (SurrealDB, RocksDB engine)
//!
//! Holds the slow-changing sales catalog: showtimes, chairs, combos and
//! vouchers. Seat availability and orders live in redb, not here; this
//! database is only read on the hot path.

pub mod models;
pub mod repository;
pub mod seed;

pub use repository::{
    ChairRepository, ComboRepository, RepoError, RepoResult, ShowtimeRepository,
    VoucherRepository,
};

use std::path::Path;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, RocksDb};
use tracing::info;

/// All catalog repositories over one connection.
#[derive(Clone)]
pub struct Catalog {
    pub showtimes: ShowtimeRepository,
    pub chairs: ChairRepository,
    pub combos: ComboRepository,
    pub vouchers: VoucherRepository,
}

impl Catalog {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            showtimes: ShowtimeRepository::new(db.clone()),
            chairs: ChairRepository::new(db.clone()),
            combos: ComboRepository::new(db.clone()),
            vouchers: VoucherRepository::new(db),
        }
    }
}

/// Open (or create) the catalog database and apply schema definitions.
pub async fn init_catalog(path: &Path) -> Result<Surreal<Db>, surrealdb::Error> {
    let db = Surreal::new::<RocksDb>(path).await?;
    db.use_ns("cinema").use_db("catalog").await?;
    define_schema(&db).await?;
    info!(path = %path.display(), "catalog database opened");
    Ok(db)
}

async fn define_schema(db: &Surreal<Db>) -> Result<(), surrealdb::Error> {
    db.query("DEFINE INDEX IF NOT EXISTS idx_voucher_code ON TABLE voucher COLUMNS code UNIQUE")
        .await?
        .check()?;
    db.query("DEFINE INDEX IF NOT EXISTS idx_chair_room ON TABLE chair COLUMNS room")
        .await?
        .check()?;
    Ok(())
}
