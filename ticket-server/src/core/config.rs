//! 服务器配置
//!
//! 所有配置通过环境变量读取（支持 `.env` 文件），未设置时使用默认值。
//!
//! | 环境变量 | 默认值 | 说明 |
//! |----------|--------|------|
//! | `WORK_DIR` | `./data` | 数据目录（redb 与 RocksDB 存储） |
//! | `HTTP_PORT` | `8000` | HTTP 监听端口 |
//! | `ENVIRONMENT` | `development` | `development` / `production` |
//! | `HOLD_TTL_SECS` | `600` | 座位保留租约时长（秒） |
//! | `SWEEP_INTERVAL_SECS` | `30` | 过期保留清扫间隔（秒） |
//! | `RECONCILE_INTERVAL_SECS` | `300` | 人工对账报告间隔（秒） |
//! | `SEED_DEMO_DATA` | 非生产环境 `true` | 启动时写入演示场次/座位数据 |
//! | `REQUEST_TIMEOUT_SECS` | `30` | 单请求超时（秒） |
//! | `GATEWAY_BASE_URL` | sandbox 地址 | 支付网关跳转地址 |
//! | `GATEWAY_MERCHANT_CODE` | `CINEMA_DEV` | 商户号 |
//! | `GATEWAY_SECRET` | 开发密钥 | 回调签名共享密钥 |
//! | `GATEWAY_RETURN_URL` | 本机回调地址 | 网关回调 URL |
//! | `TICKET_SECRET` | 开发密钥 | 取票二维码签名密钥 |
//! | `TICKET_VALIDITY_MINUTES` | `4320` | 二维码签名有效期（分钟） |
//! | `LOG_LEVEL` | `info` | 日志级别过滤器 |
//! | `LOG_JSON` | `false` | JSON 行格式日志 |
//! | `LOG_DIR` | 无 | 设置后写入按日滚动日志文件 |

use std::path::PathBuf;

/// Payment gateway connection settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Redirect base; the signed query string is appended to it
    pub base_url: String,
    /// Merchant identifier included in the canonical string
    pub merchant_code: String,
    /// Shared secret for callback signatures
    pub secret: String,
    /// Where the gateway sends the customer (and the callback) afterwards
    pub return_url: String,
}

/// QR ticket signing settings.
#[derive(Debug, Clone)]
pub struct TicketConfig {
    /// Dedicated signing secret (never the gateway secret)
    pub secret: String,
    /// Signature validity horizon in minutes
    pub validity_minutes: i64,
}

/// Server configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: PathBuf,
    pub http_port: u16,
    pub environment: String,
    pub hold_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub reconcile_interval_secs: u64,
    pub seed_demo_data: bool,
    pub request_timeout_secs: u64,
    pub gateway: GatewayConfig,
    pub ticket: TicketConfig,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).ok().unwrap_or_else(|| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        let environment = env_or("ENVIRONMENT", "development");
        let is_production = environment == "production";

        Self {
            work_dir: PathBuf::from(env_or("WORK_DIR", "./data")),
            http_port: env_parse_or("HTTP_PORT", 8000),
            hold_ttl_secs: env_parse_or("HOLD_TTL_SECS", 600),
            sweep_interval_secs: env_parse_or("SWEEP_INTERVAL_SECS", 30),
            reconcile_interval_secs: env_parse_or("RECONCILE_INTERVAL_SECS", 300),
            seed_demo_data: env_parse_or("SEED_DEMO_DATA", !is_production),
            request_timeout_secs: env_parse_or("REQUEST_TIMEOUT_SECS", 30),
            gateway: GatewayConfig {
                base_url: env_or("GATEWAY_BASE_URL", "https://sandbox.gateway.example/pay"),
                merchant_code: env_or("GATEWAY_MERCHANT_CODE", "CINEMA_DEV"),
                secret: env_or("GATEWAY_SECRET", "dev-gateway-secret-change-me"),
                return_url: env_or(
                    "GATEWAY_RETURN_URL",
                    "http://localhost:8000/api/Payment/process-payment-callback",
                ),
            },
            ticket: TicketConfig {
                secret: env_or("TICKET_SECRET", "dev-ticket-secret-change-me"),
                validity_minutes: env_parse_or("TICKET_VALIDITY_MINUTES", 4320),
            },
            environment,
        }
    }

    /// `from_env` with the two knobs every test needs pinned.
    pub fn with_overrides(work_dir: impl Into<PathBuf>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    /// Directory holding the embedded databases.
    pub fn database_dir(&self) -> PathBuf {
        self.work_dir.join("database")
    }

    /// Seat availability store (redb file).
    pub fn seats_db_path(&self) -> PathBuf {
        self.database_dir().join("seats.redb")
    }

    /// Order settlement store (redb file).
    pub fn orders_db_path(&self) -> PathBuf {
        self.database_dir().join("orders.redb")
    }

    /// Catalog database (RocksDB directory).
    pub fn catalog_db_path(&self) -> PathBuf {
        self.database_dir().join("catalog")
    }

    pub fn ensure_work_dir_structure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.database_dir())
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Secrets that must not reach production with their dev defaults.
    pub fn using_default_secrets(&self) -> bool {
        self.gateway.secret.starts_with("dev-") || self.ticket.secret.starts_with("dev-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_development_friendly() {
        let config = Config::with_overrides("/tmp/ticket-test", 0);
        assert_eq!(config.hold_ttl_secs, 600);
        assert!(!config.is_production());
        assert!(config.using_default_secrets());
    }

    #[test]
    fn overrides_pin_work_dir_and_port() {
        let config = Config::with_overrides("/tmp/elsewhere", 18099);
        assert_eq!(config.work_dir, PathBuf::from("/tmp/elsewhere"));
        assert_eq!(config.http_port, 18099);
    }
}
