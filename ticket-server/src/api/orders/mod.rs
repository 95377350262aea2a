//! Order API 模块
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/Order | POST | 从座位保留创建订单 (定价快照) |
//! | /api/Order/{order_id} | GET | 查询订单快照 |
//! | /api/Order/{order_id}/cancel | POST | 取消待支付订单并释放座位 |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/Order", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create))
        .route("/{order_id}", get(handler::get_by_id))
        .route("/{order_id}/cancel", post(handler::cancel))
}
