//! Chair API 模块
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/Chair/showTime/{showtime_id} | GET | 场次座位图 (含实时状态) |
//! | /api/Chair/select-chairs/{showtime_id} | POST | 原子选座 (全部成功或全部失败) |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/Chair", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/showTime/{showtime_id}", get(handler::chairs_for_showtime))
        .route("/select-chairs/{showtime_id}", post(handler::select_chairs))
}
