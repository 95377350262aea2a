//! Order API Handlers
//!
//! Thin edge over the settlement coordinator: shape-check the input,
//! call the owning service, hand the persisted snapshot back. All
//! pricing and state rules live below this layer.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

use crate::core::ServerState;
use crate::settlement::{ComboSelection, CreateOrderRequest};
use crate::utils::{AppError, AppResponse, AppResult};
use shared::order::OrderSnapshot;

/// Voucher codes are short human-typed strings; anything longer is junk.
const MAX_VOUCHER_CODE_LEN: usize = 64;

// ============ 请求类型 ============

#[derive(Debug, Deserialize)]
pub struct CreateOrderDto {
    pub showtime_id: String,
    pub hold_token: String,
    #[serde(default)]
    pub combos: Vec<ComboSelectionDto>,
    #[serde(default)]
    pub voucher_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ComboSelectionDto {
    pub combo_id: String,
    pub quantity: i32,
}

// ============ Handlers ============

/// POST /api/Order - 从座位保留创建订单
///
/// 创建后座位保留归订单所有，结算路径 (支付回调 / 取消 / 过期) 接管。
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<CreateOrderDto>,
) -> AppResult<Json<AppResponse<OrderSnapshot>>> {
    if payload.showtime_id.trim().is_empty() {
        return Err(AppError::validation("showtime_id must not be blank"));
    }
    if payload.hold_token.trim().is_empty() {
        return Err(AppError::validation("hold_token must not be blank"));
    }
    for combo in &payload.combos {
        if combo.combo_id.trim().is_empty() {
            return Err(AppError::validation("combo_id must not be blank"));
        }
        if combo.quantity <= 0 {
            return Err(AppError::validation(format!(
                "combo quantity must be positive, got {}",
                combo.quantity
            )));
        }
    }
    if let Some(code) = &payload.voucher_code {
        if code.trim().is_empty() {
            return Err(AppError::validation("voucher_code must not be blank"));
        }
        if code.len() > MAX_VOUCHER_CODE_LEN {
            return Err(AppError::validation("voucher_code too long"));
        }
    }

    let request = CreateOrderRequest {
        showtime_id: payload.showtime_id,
        hold_token: payload.hold_token,
        combos: payload
            .combos
            .into_iter()
            .map(|c| ComboSelection {
                combo_id: c.combo_id,
                quantity: c.quantity,
            })
            .collect(),
        voucher_code: payload.voucher_code,
    };

    let snapshot = state.settlement.create_order(request).await?;
    Ok(AppResponse::ok(snapshot))
}

/// GET /api/Order/:order_id - 查询订单快照
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(order_id): Path<String>,
) -> AppResult<Json<AppResponse<OrderSnapshot>>> {
    let snapshot = state.settlement.order_status(&order_id)?;
    Ok(AppResponse::ok(snapshot))
}

/// POST /api/Order/:order_id/cancel - 取消待支付订单
///
/// 仅 PENDING 订单可取消；座位立即回到可售状态。
pub async fn cancel(
    State(state): State<ServerState>,
    Path(order_id): Path<String>,
) -> AppResult<Json<AppResponse<OrderSnapshot>>> {
    let snapshot = state.settlement.cancel(&order_id)?;
    Ok(AppResponse::ok_with_message(snapshot, "Order canceled"))
}
