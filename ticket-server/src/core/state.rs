//! 服务器状态
//!
//! ServerState 持有所有子系统的共享引用，按 Arc 浅拷贝传递。
//!
//! | 字段 | 类型 | 说明 |
//! |------|------|------|
//! | config | Config | 配置项（不可变） |
//! | catalog | Arc<Catalog> | 场次/座位/套餐/优惠券目录 (SurrealDB) |
//! | seats | SeatStore | 座位保留存储 (redb) |
//! | orders | OrderStorage | 订单结算存储 (redb) |
//! | vouchers | Arc<VoucherEngine> | 优惠券评估 |
//! | gateway | Arc<PaymentGatewayAdapter> | 支付网关适配器 |
//! | settlement | Arc<SettlementCoordinator> | 订单状态机 |
//! | tickets | Arc<QrTicketService> | 取票二维码 |
//! | tasks | Arc<BackgroundTasks> | 后台任务注册表 |

use crate::core::Config;
use crate::core::error::{Result, ServerError};
use crate::core::tasks::BackgroundTasks;
use crate::db::{Catalog, init_catalog, seed};
use crate::gateway::PaymentGatewayAdapter;
use crate::seating::{HoldSweeper, SeatStore};
use crate::settlement::{OrderStorage, ReconciliationReporter, SettlementCoordinator};
use crate::tickets::QrTicketService;
use crate::vouchers::VoucherEngine;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub catalog: Arc<Catalog>,
    pub seats: SeatStore,
    pub orders: OrderStorage,
    pub vouchers: Arc<VoucherEngine>,
    pub gateway: Arc<PaymentGatewayAdapter>,
    pub settlement: Arc<SettlementCoordinator>,
    pub tickets: Arc<QrTicketService>,
    pub tasks: Arc<BackgroundTasks>,
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 按顺序初始化：
    /// 1. 工作目录结构
    /// 2. 嵌入式存储（seats.redb / orders.redb / catalog RocksDB）
    /// 3. 目录数据（可选 demo 数据种子）与优惠券缓存
    /// 4. 网关适配器、结算协调器、取票服务
    pub async fn initialize(config: &Config) -> Result<Self> {
        config.ensure_work_dir_structure()?;

        if config.is_production() && config.using_default_secrets() {
            return Err(ServerError::Config(
                "refusing to start production with default dev secrets".to_string(),
            ));
        }

        let seats = SeatStore::open(config.seats_db_path())
            .map_err(|e| ServerError::Storage(e.to_string()))?;
        let orders = OrderStorage::open(config.orders_db_path())
            .map_err(|e| ServerError::Storage(e.to_string()))?;

        let db = init_catalog(&config.catalog_db_path()).await?;
        let catalog = Arc::new(Catalog::new(db));

        if config.seed_demo_data {
            match seed::seed_if_empty(&catalog).await {
                Ok(Some(summary)) => info!(
                    showtimes = summary.showtimes,
                    chairs = summary.chairs,
                    combos = summary.combos,
                    vouchers = summary.vouchers,
                    "demo catalog seeded"
                ),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "demo seeding failed, continuing with existing data"),
            }
        }

        let vouchers = Arc::new(VoucherEngine::new(catalog.vouchers.clone()));
        let loaded = vouchers
            .reload()
            .await
            .map_err(|e| ServerError::Storage(e.to_string()))?;
        info!(vouchers = loaded, "voucher cache primed");

        let gateway = Arc::new(
            PaymentGatewayAdapter::from_config(&config.gateway)
                .map_err(|e| ServerError::Config(e.to_string()))?,
        );

        let settlement = Arc::new(SettlementCoordinator::new(
            seats.clone(),
            orders.clone(),
            catalog.clone(),
            vouchers.clone(),
            gateway.clone(),
        ));
        let tickets = Arc::new(QrTicketService::new(
            orders.clone(),
            &config.ticket.secret,
            config.ticket.validity_minutes,
        ));

        Ok(Self {
            config: config.clone(),
            catalog,
            seats,
            orders,
            vouchers,
            gateway,
            settlement,
            tickets,
            tasks: Arc::new(BackgroundTasks::new()),
        })
    }

    /// 启动后台任务
    ///
    /// 必须在 `Server::run()` 之前调用。
    /// - 保留清扫器：回收过期租约
    /// - 对账报告器：重复提示待人工处理的已付款失败订单
    pub fn start_background_tasks(&self) {
        let sweeper = HoldSweeper::new(
            self.seats.clone(),
            Duration::from_secs(self.config.sweep_interval_secs),
            self.tasks.shutdown_token(),
        );
        self.tasks.spawn("hold-sweeper", sweeper.run());

        let reporter = ReconciliationReporter::new(
            self.orders.clone(),
            Duration::from_secs(self.config.reconcile_interval_secs),
            self.tasks.shutdown_token(),
        );
        self.tasks.spawn("reconciliation-reporter", reporter.run());

        self.tasks.log_summary();
    }

    /// 座位保留租约时长
    pub fn hold_ttl(&self) -> Duration {
        Duration::from_secs(self.config.hold_ttl_secs)
    }
}
