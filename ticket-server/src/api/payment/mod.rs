//! Payment API 模块
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/Payment/create-payment-url | POST | 生成签名支付跳转 URL |
//! | /api/Payment/process-payment-callback | GET | 网关回调 (永远 200, 网关格式响应体) |
//! | /api/Payment/check-stastus/{order_id} | GET | 结算状态查询 |
//!
//! `check-stastus` 的拼写是历史遗留，上线客户端依赖它，不能改。

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/Payment", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/create-payment-url", post(handler::create_payment_url))
        .route(
            "/process-payment-callback",
            get(handler::process_payment_callback),
        )
        .route("/check-stastus/{order_id}", get(handler::check_status))
}
