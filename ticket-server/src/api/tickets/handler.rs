//! Ticket API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

use crate::core::ServerState;
use crate::utils::{AppError, AppResponse, AppResult};
use shared::ticket::{IssuedTicket, TicketVerification};

#[derive(Debug, Deserialize)]
pub struct QrVerifyRequest {
    pub qr_content: String,
    /// `false` = door-display dry run, `true` = consume the ticket
    #[serde(default)]
    pub mark_as_used: bool,
}

/// POST /api/test/qr-generate/:order_id - 签发入场二维码
///
/// 仅 COMPLETED 订单可签发；重复调用轮换 nonce，旧二维码立即作废。
pub async fn qr_generate(
    State(state): State<ServerState>,
    Path(order_id): Path<String>,
) -> AppResult<Json<AppResponse<IssuedTicket>>> {
    let ticket = state.tickets.issue(&order_id)?;
    Ok(AppResponse::ok(ticket))
}

/// POST /api/test/qr-verify - 闸机验票
///
/// `mark_as_used = true` 时核销并把订单置为 PRINTED，原子完成；
/// 两台闸机同时扫同一张票，恰好一台成功。
pub async fn qr_verify(
    State(state): State<ServerState>,
    Json(payload): Json<QrVerifyRequest>,
) -> AppResult<Json<AppResponse<TicketVerification>>> {
    if payload.qr_content.trim().is_empty() {
        return Err(AppError::validation("qr_content must not be blank"));
    }

    let verification = state.tickets.verify(&payload.qr_content, payload.mark_as_used)?;
    Ok(AppResponse::ok(verification))
}
