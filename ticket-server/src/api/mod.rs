//! HTTP API
//!
//! 路由层：每个资源一个子模块，`build_router` 负责汇总并挂载
//! 全局中间件（CORS、请求超时、访问日志）。

pub mod chairs;
pub mod convert;
pub mod health;
pub mod orders;
pub mod payment;
pub mod tickets;

use crate::core::ServerState;
use axum::{Router, middleware};
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;

/// HTTP 请求日志中间件
async fn log_request(
    request: http::Request<axum::body::Body>,
    next: middleware::Next,
) -> http::Response<axum::body::Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let status = response.status();

    tracing::info!(target: "http_access", "{} {} {}", method, uri, status);

    response
}

/// Build the full application router.
pub fn build_router(state: ServerState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .merge(chairs::router())
        .merge(orders::router())
        .merge(payment::router())
        .merge(tickets::router())
        .merge(health::router())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(timeout))
        .layer(middleware::from_fn(log_request))
}
