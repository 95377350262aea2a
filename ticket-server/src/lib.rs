//! Cinema Ticket Server - 影院售票结算服务
//!
//! # 架构概述
//!
//! 单机多线程票务引擎，覆盖从选座到闸机验票的完整链路：
//!
//! - **座位** (`seating`): 原子多座位保留 (TTL 租约) + 后台清扫
//! - **目录** (`db`): 场次/座位/套餐/优惠券目录 (嵌入式 SurrealDB)
//! - **订单** (`settlement`): 定价快照、状态机结算、回调审计 (redb)
//! - **网关** (`gateway`): 支付网关签名协议与回调验签
//! - **优惠券** (`vouchers`): 纯函数式折扣评估 (内存缓存)
//! - **票据** (`tickets`): 签名二维码签发与核销
//! - **HTTP API** (`api`): RESTful API 接口
//!
//! # 模块结构
//!
//! ```text
//! ticket-server/src/
//! ├── core/          # 配置、状态、服务器、后台任务
//! ├── api/           # HTTP 路由和处理器
//! ├── db/            # 目录数据库层 (SurrealDB)
//! ├── seating/       # 座位保留存储 (redb)
//! ├── settlement/    # 订单组装与结算
//! ├── gateway/       # 支付网关适配器
//! ├── vouchers/      # 优惠券引擎
//! ├── tickets/       # 二维码票据服务
//! └── utils/         # 错误、响应信封、日志
//! ```

pub mod api;
pub mod core;
pub mod db;
pub mod gateway;
pub mod seating;
pub mod settlement;
pub mod tickets;
pub mod utils;
pub mod vouchers;

// Re-export 公共类型
pub use crate::core::{Config, Server, ServerState};
pub use gateway::PaymentGatewayAdapter;
pub use seating::SeatStore;
pub use settlement::{OrderStorage, SettlementCoordinator};
pub use tickets::QrTicketService;
pub use utils::{AppError, AppResponse, AppResult};
pub use vouchers::VoucherEngine;

// Audit logging macro - 结算与核销的关键事件走独立的 audit target，
// 便于接 SIEM 或单独落盘
#[macro_export]
macro_rules! audit_log {
    ($($arg:tt)*) => {
        tracing::info!(target: "audit", $($arg)*)
    };
}

/// Load `.env`, then install the global tracing subscriber from
/// `LOG_LEVEL` / `LOG_JSON` / `LOG_DIR`. The returned guard (present
/// when file logging is on) must live as long as the process.
pub fn setup_environment() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    dotenv::dotenv().ok();

    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let json = std::env::var("LOG_JSON")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let log_dir = std::env::var("LOG_DIR").ok();

    utils::logger::init_logging(&level, json, log_dir.as_deref())
}

pub fn print_banner() {
    println!(
        r#"
  ______ _      __        __
 /_  __/(_)____/ /_____  / /_
  / /  / / ___/ //_/ _ \/ __/
 / /  / / /__/ ,< /  __/ /_
/_/  /_/\___/_/|_|\___/\__/
   _____
  / ___/___  ______   _____  _____
  \__ \/ _ \/ ___/ | / / _ \/ ___/
 ___/ /  __/ /   | |/ /  __/ /
/____/\___/_/    |___/\___/_/
    "#
    );
}
