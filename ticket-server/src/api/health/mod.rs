//! 健康检查路由
//!
//! # 路由列表
//!
//! | 路径 | 方法 | 说明 | 认证 |
//! |------|------|------|------|
//! | /api/health | GET | 简单健康检查 | 无 |
//! | /api/health/detailed | GET | 详细健康检查 (含存储状态) | 无 |
//!
//! # 响应示例
//!
//! ```json
//! {
//!   "status": "healthy",
//!   "version": "0.1.0",
//!   "environment": "development",
//!   "uptime_seconds": 42
//! }
//! ```

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use std::time::SystemTime;

use crate::core::ServerState;

/// 健康检查路由 - 公共路由 (无需认证)
pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/health/detailed", get(detailed_health))
}

/// 简单健康检查响应
#[derive(Serialize)]
pub struct HealthResponse {
    /// 状态 (healthy | degraded)
    status: &'static str,
    /// 版本号
    version: &'static str,
    /// 运行环境
    environment: String,
    /// 运行时间 (秒)
    uptime_seconds: u64,
}

/// 详细健康检查响应
#[derive(Serialize)]
pub struct DetailedHealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    /// 各组件检查结果
    checks: HealthChecks,
    /// 存储行数统计
    storage: StorageCounters,
}

/// 健康检查详情
#[derive(Serialize)]
pub struct HealthChecks {
    /// 放映目录 (SurrealDB) 检查
    catalog: CheckResult,
    /// 订单存储 (redb) 检查
    orders: CheckResult,
    /// 座位存储 (redb) 检查
    seats: CheckResult,
}

/// 存储行数统计
#[derive(Serialize, Default)]
pub struct StorageCounters {
    orders: u64,
    payment_attempts: u64,
    tickets: u64,
    audit_entries: u64,
    seat_holds: u64,
}

/// 单项检查结果
#[derive(Serialize)]
pub struct CheckResult {
    /// 状态 (ok | error)
    status: &'static str,
    /// 延迟 (毫秒)
    latency_ms: Option<u64>,
    /// 错误信息
    message: Option<String>,
}

impl CheckResult {
    fn ok_with_latency(latency_ms: u64) -> Self {
        Self {
            status: "ok",
            latency_ms: Some(latency_ms),
            message: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            latency_ms: None,
            message: Some(message.into()),
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

// 服务器启动时间 (懒加载静态变量)
static START_TIME: std::sync::OnceLock<SystemTime> = std::sync::OnceLock::new();

pub(crate) fn record_start_time() {
    START_TIME.get_or_init(SystemTime::now);
}

fn get_uptime_seconds() -> u64 {
    let start = START_TIME.get_or_init(SystemTime::now);
    SystemTime::now()
        .duration_since(*start)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// 基础健康检查
pub async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.clone(),
        uptime_seconds: get_uptime_seconds(),
    })
}

/// 包含组件状态的详细健康检查
pub async fn detailed_health(State(state): State<ServerState>) -> Json<DetailedHealthResponse> {
    let mut storage = StorageCounters::default();

    // 检查放映目录: 一次小查询验证 SurrealDB 连接
    let catalog_start = std::time::Instant::now();
    let catalog_check = match state.catalog.showtimes.find_all().await {
        Ok(_) => CheckResult::ok_with_latency(catalog_start.elapsed().as_millis() as u64),
        Err(e) => CheckResult::error(format!("catalog error: {}", e)),
    };

    // 检查订单存储
    let orders_start = std::time::Instant::now();
    let orders_check = match state.orders.stats() {
        Ok(stats) => {
            storage.orders = stats.orders;
            storage.payment_attempts = stats.payment_attempts;
            storage.tickets = stats.tickets;
            storage.audit_entries = stats.audit_entries;
            CheckResult::ok_with_latency(orders_start.elapsed().as_millis() as u64)
        }
        Err(e) => CheckResult::error(format!("order storage error: {}", e)),
    };

    // 检查座位存储
    let seats_start = std::time::Instant::now();
    let seats_check = match state.seats.hold_count() {
        Ok(holds) => {
            storage.seat_holds = holds;
            CheckResult::ok_with_latency(seats_start.elapsed().as_millis() as u64)
        }
        Err(e) => CheckResult::error(format!("seat storage error: {}", e)),
    };

    let all_ok = catalog_check.is_ok() && orders_check.is_ok() && seats_check.is_ok();

    Json(DetailedHealthResponse {
        status: if all_ok { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: get_uptime_seconds(),
        checks: HealthChecks {
            catalog: catalog_check,
            orders: orders_check,
            seats: seats_check,
        },
        storage,
    })
}
