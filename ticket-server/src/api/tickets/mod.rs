//! Ticket API 模块
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/test/qr-generate/{order_id} | POST | 为已支付订单签发入场二维码 |
//! | /api/test/qr-verify | POST | 闸机验票 (可选核销) |
//!
//! `/api/test` 前缀是历史遗留：闸机固件写死了这两个路径。

mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/test", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/qr-generate/{order_id}", post(handler::qr_generate))
        .route("/qr-verify", post(handler::qr_verify))
}
