//! Voucher evaluation
//!
//! Vouchers are read-only at runtime and hot on the order path, so they
//! are cached in memory behind a read-mostly lock, warmed at startup and
//! reloadable on demand. Evaluation itself is pure: same code, total and
//! clock always give the same answer.

use crate::db::models::Voucher;
use crate::db::repository::{RepoResult, VoucherRepository};
use crate::settlement::money;
use parking_lot::RwLock;
use shared::order::AppliedVoucher;
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoucherError {
    #[error("voucher not found: {0}")]
    NotFound(String),

    /// The validity window has not opened yet
    #[error("voucher not yet active: {0}")]
    NotYetActive(String),

    /// The validity window has closed
    #[error("voucher expired: {0}")]
    Expired(String),
}

/// Pure evaluation of one voucher against a candidate total.
///
/// The window is the closed interval `[start_at, end_at]`; both
/// boundaries accept.
pub fn evaluate_voucher(
    voucher: &Voucher,
    candidate_total: f64,
    now: i64,
) -> Result<AppliedVoucher, VoucherError> {
    if now < voucher.start_at {
        return Err(VoucherError::NotYetActive(voucher.code.clone()));
    }
    if now > voucher.end_at {
        return Err(VoucherError::Expired(voucher.code.clone()));
    }
    let discount = money::discount_amount(candidate_total, voucher.rate, voucher.max_value);
    Ok(AppliedVoucher {
        code: voucher.code.clone(),
        rate: voucher.rate,
        max_value: voucher.max_value,
        discount,
    })
}

/// Cached voucher catalog.
pub struct VoucherEngine {
    repo: VoucherRepository,
    cache: RwLock<HashMap<String, Voucher>>,
}

impl VoucherEngine {
    pub fn new(repo: VoucherRepository) -> Self {
        Self {
            repo,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the cache with the current catalog contents.
    pub async fn reload(&self) -> RepoResult<usize> {
        let vouchers = self.repo.find_all().await?;
        let mut map = HashMap::with_capacity(vouchers.len());
        for voucher in vouchers {
            map.insert(voucher.code.clone(), voucher);
        }
        let count = map.len();
        *self.cache.write() = map;
        info!(count = count, "voucher cache loaded");
        Ok(count)
    }

    /// Evaluate a code against a candidate total. Never mutates anything.
    pub fn evaluate(
        &self,
        code: &str,
        candidate_total: f64,
        now: i64,
    ) -> Result<AppliedVoucher, VoucherError> {
        let cache = self.cache.read();
        let voucher = cache
            .get(code)
            .ok_or_else(|| VoucherError::NotFound(code.to_string()))?;
        evaluate_voucher(voucher, candidate_total, now)
    }

    /// Test hook: drop a voucher straight into the cache.
    #[cfg(test)]
    pub fn insert_cached(&self, voucher: Voucher) {
        self.cache.write().insert(voucher.code.clone(), voucher);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voucher(code: &str, rate: f64, max_value: f64, start_at: i64, end_at: i64) -> Voucher {
        Voucher {
            id: None,
            code: code.to_string(),
            rate,
            max_value,
            start_at,
            end_at,
        }
    }

    #[test]
    fn evaluates_inside_window() {
        let v = voucher("SAVE10", 0.10, 1000.0, 100, 200);
        let applied = evaluate_voucher(&v, 300.0, 150).unwrap();
        assert_eq!(applied.discount, 30.0);
        assert_eq!(applied.code, "SAVE10");
    }

    #[test]
    fn window_boundaries_are_inclusive() {
        let v = voucher("EDGE", 0.10, 1000.0, 100, 200);
        assert!(evaluate_voucher(&v, 300.0, 100).is_ok());
        assert!(evaluate_voucher(&v, 300.0, 200).is_ok());
    }

    #[test]
    fn rejects_before_window() {
        let v = voucher("SOON", 0.10, 1000.0, 100, 200);
        assert_eq!(
            evaluate_voucher(&v, 300.0, 99).unwrap_err(),
            VoucherError::NotYetActive("SOON".to_string())
        );
    }

    #[test]
    fn rejects_after_window() {
        let v = voucher("LATE", 0.10, 1000.0, 100, 200);
        assert_eq!(
            evaluate_voucher(&v, 300.0, 201).unwrap_err(),
            VoucherError::Expired("LATE".to_string())
        );
    }

    #[test]
    fn discount_respects_cap_and_total() {
        let v = voucher("BIG", 0.50, 100.0, 0, i64::MAX);
        let applied = evaluate_voucher(&v, 10_000.0, 1).unwrap();
        assert_eq!(applied.discount, 100.0);

        let v = voucher("ALL", 1.0, 10_000.0, 0, i64::MAX);
        let applied = evaluate_voucher(&v, 40.0, 1).unwrap();
        assert_eq!(applied.discount, 40.0);
    }
}
