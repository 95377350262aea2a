//! Voucher Repository

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::{Voucher, VoucherCreate};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

const TABLE: &str = "voucher";

#[derive(Clone)]
pub struct VoucherRepository {
    base: BaseRepository,
}

impl VoucherRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn find_all(&self) -> RepoResult<Vec<Voucher>> {
        let vouchers: Vec<Voucher> = self
            .base
            .db()
            .query("SELECT * FROM voucher ORDER BY code")
            .await?
            .take(0)?;
        Ok(vouchers)
    }

    pub async fn find_by_code(&self, code: &str) -> RepoResult<Option<Voucher>> {
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM voucher WHERE code = $code LIMIT 1")
            .bind(("code", code.to_string()))
            .await?;
        let vouchers: Vec<Voucher> = result.take(0)?;
        Ok(vouchers.into_iter().next())
    }

    /// Create with a caller-chosen key (seed uses deterministic keys)
    pub async fn create_with_key(&self, key: &str, data: VoucherCreate) -> RepoResult<Voucher> {
        if self.find_by_code(&data.code).await?.is_some() {
            return Err(RepoError::Duplicate(format!(
                "Voucher code '{}' already exists",
                data.code
            )));
        }
        let voucher = Voucher {
            id: None,
            code: data.code,
            rate: data.rate,
            max_value: data.max_value,
            start_at: data.start_at,
            end_at: data.end_at,
        };
        let created: Option<Voucher> =
            self.base.db().create((TABLE, key)).content(voucher).await?;
        created.ok_or_else(|| RepoError::Database("Failed to create voucher".to_string()))
    }
}
