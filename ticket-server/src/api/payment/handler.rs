//! Payment API Handlers
//!
//! The callback handler is a trust boundary: whatever arrives, it
//! answers HTTP 200 with a gateway-format body and leaves the real
//! decision (and the audit trail) to the settlement coordinator.

use axum::{
    Json,
    extract::{Path, Query, RawQuery, State, rejection::QueryRejection},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::core::ServerState;
use crate::settlement::CallbackOutcome;
use crate::utils::{AppError, AppResponse, AppResult};
use shared::order::{FailureReason, OrderStatus};

// ============ 请求/响应类型 ============

#[derive(Debug, Deserialize)]
pub struct CreatePaymentUrlRequest {
    pub order_id: String,
}

#[derive(Debug, Serialize)]
pub struct CreatePaymentUrlResponse {
    pub payment_url: String,
}

/// Acknowledgement in the gateway's own vocabulary, not ours.
#[derive(Debug, Serialize)]
pub struct GatewayAck {
    pub rsp_code: &'static str,
    pub message: &'static str,
}

impl From<&CallbackOutcome> for GatewayAck {
    fn from(outcome: &CallbackOutcome) -> Self {
        let rsp_code = match outcome {
            CallbackOutcome::Completed { .. } => "00",
            CallbackOutcome::Failed { .. } => "99",
        };
        Self {
            rsp_code,
            message: outcome.gateway_body(),
        }
    }
}

/// Settlement status projection for polling clients.
#[derive(Debug, Serialize)]
pub struct CheckStatusResponse {
    pub order_id: String,
    pub status: OrderStatus,
    pub total_price: f64,
    pub discount_price: f64,
    pub payment_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_txn_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

// ============ Handlers ============

/// POST /api/Payment/create-payment-url - 生成签名支付跳转 URL
pub async fn create_payment_url(
    State(state): State<ServerState>,
    Json(payload): Json<CreatePaymentUrlRequest>,
) -> AppResult<Json<AppResponse<CreatePaymentUrlResponse>>> {
    if payload.order_id.trim().is_empty() {
        return Err(AppError::validation("order_id must not be blank"));
    }

    let payment_url = state.settlement.create_payment_url(&payload.order_id)?;
    Ok(AppResponse::ok(CreatePaymentUrlResponse { payment_url }))
}

/// GET /api/Payment/process-payment-callback - 网关回调
///
/// 永远 200：网关只理解自己的响应格式，任何传输层错误都会触发重试
/// 风暴。参数解析失败也走协调器的通用失败路径，保证原始报文进审计。
pub async fn process_payment_callback(
    State(state): State<ServerState>,
    RawQuery(raw): RawQuery,
    params: Result<Query<BTreeMap<String, String>>, QueryRejection>,
) -> Json<GatewayAck> {
    let raw = raw.unwrap_or_default();
    let params = match params {
        Ok(Query(map)) => map,
        Err(rejection) => {
            // Unparseable query: hand the coordinator an empty map so the
            // signature check fails and the raw payload still gets audited.
            warn!(error = %rejection, "callback query rejected");
            BTreeMap::new()
        }
    };

    let outcome = state.settlement.handle_callback(&raw, &params);
    Json(GatewayAck::from(&outcome))
}

/// GET /api/Payment/check-stastus/:order_id - 结算状态查询
pub async fn check_status(
    State(state): State<ServerState>,
    Path(order_id): Path<String>,
) -> AppResult<Json<AppResponse<CheckStatusResponse>>> {
    let order = state.settlement.order_status(&order_id)?;
    Ok(AppResponse::ok(CheckStatusResponse {
        order_id: order.order_id,
        status: order.status,
        total_price: order.total_price,
        discount_price: order.discount_price,
        payment_price: order.payment_price,
        failure_reason: order.failure_reason,
        gateway_txn_no: order.gateway_txn_no,
        completed_at: order.completed_at,
    }))
}
