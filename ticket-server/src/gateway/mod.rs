//! Payment gateway adapter
//!
//! Generic redirect-and-callback contract: every request carries its
//! parameters as `key=value` pairs, signed over the canonically sorted
//! concatenation with a shared secret. The gateway echoes the same
//! discipline back on its callback.
//!
//! Nothing in a callback is trusted until [`PaymentGatewayAdapter::verify_callback`]
//! has accepted it. A valid signature only authenticates the sender;
//! whether the payment itself succeeded is a separate question answered
//! by the response code.

pub mod signature;

use crate::core::config::GatewayConfig;
use crate::settlement::money;
use shared::util::now_millis;
use signature::{HmacSha256Signature, InvalidKeyError, SignatureScheme};
use std::collections::BTreeMap;
use thiserror::Error;

/// Query parameter carrying the hex signature; excluded from signing.
pub const SIGNATURE_FIELD: &str = "sign";

/// Gateway response code meaning the charge went through.
pub const RESPONSE_SUCCESS: &str = "00";

pub const FIELD_MERCHANT_CODE: &str = "merchantCode";
pub const FIELD_ORDER_ID: &str = "orderId";
pub const FIELD_AMOUNT: &str = "amount";
pub const FIELD_RESPONSE_CODE: &str = "responseCode";
pub const FIELD_TRADE_NO: &str = "tradeNo";
pub const FIELD_TIMESTAMP: &str = "timestamp";
pub const FIELD_RETURN_URL: &str = "returnUrl";

#[derive(Debug, Error, PartialEq)]
pub enum GatewayError {
    #[error("missing callback field: {0}")]
    MissingField(&'static str),

    #[error("callback signature mismatch")]
    SignatureMismatch,

    #[error("unparseable amount: {0}")]
    MalformedAmount(String),

    #[error("amount out of range: {0}")]
    AmountOutOfRange(f64),
}

impl GatewayError {
    /// Whether the sender authenticated before the payload was rejected.
    /// Shape errors after a good signature are recorded differently in
    /// the audit trail than forgeries.
    pub fn authenticated(&self) -> bool {
        !matches!(
            self,
            GatewayError::SignatureMismatch | GatewayError::MissingField(SIGNATURE_FIELD)
        )
    }
}

/// Verified, shape-checked callback contents.
#[derive(Debug, Clone)]
pub struct CallbackPayload {
    pub order_id: String,
    pub amount: f64,
    pub response_code: String,
    pub gateway_txn_no: Option<String>,
}

impl CallbackPayload {
    pub fn is_success(&self) -> bool {
        self.response_code == RESPONSE_SUCCESS
    }
}

pub struct PaymentGatewayAdapter {
    base_url: String,
    merchant_code: String,
    return_url: String,
    scheme: Box<dyn SignatureScheme>,
}

impl PaymentGatewayAdapter {
    pub fn new(
        base_url: String,
        merchant_code: String,
        return_url: String,
        scheme: Box<dyn SignatureScheme>,
    ) -> Self {
        Self {
            base_url,
            merchant_code,
            return_url,
            scheme,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, InvalidKeyError> {
        let scheme = HmacSha256Signature::new(config.secret.as_bytes())?;
        Ok(Self::new(
            config.base_url.clone(),
            config.merchant_code.clone(),
            config.return_url.clone(),
            Box::new(scheme),
        ))
    }

    /// Canonical form: parameters sorted by key, joined as
    /// `k1=v1&k2=v2`, the signature field excluded. Values enter
    /// verbatim; both sides must agree on this exact string.
    pub fn canonical_string(params: &BTreeMap<String, String>) -> String {
        params
            .iter()
            .filter(|(key, _)| key.as_str() != SIGNATURE_FIELD)
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Build the signed redirect URL the client is sent to.
    pub fn create_payment_url(&self, order_id: &str, amount: f64) -> String {
        let mut params = BTreeMap::new();
        params.insert(FIELD_MERCHANT_CODE.to_string(), self.merchant_code.clone());
        params.insert(FIELD_ORDER_ID.to_string(), order_id.to_string());
        params.insert(FIELD_AMOUNT.to_string(), format!("{amount:.2}"));
        params.insert(FIELD_TIMESTAMP.to_string(), now_millis().to_string());
        params.insert(FIELD_RETURN_URL.to_string(), self.return_url.clone());

        let canonical = Self::canonical_string(&params);
        let signature = self.scheme.sign(&canonical);
        format!(
            "{}?{}&{}={}",
            self.base_url, canonical, SIGNATURE_FIELD, signature
        )
    }

    /// Authenticate and shape-check a callback.
    ///
    /// Signature first: it is recomputed over every received parameter
    /// except the signature field itself, so nothing can be smuggled in
    /// unsigned. Only then are the business fields extracted.
    pub fn verify_callback(
        &self,
        params: &BTreeMap<String, String>,
    ) -> Result<CallbackPayload, GatewayError> {
        let provided = params
            .get(SIGNATURE_FIELD)
            .ok_or(GatewayError::MissingField(SIGNATURE_FIELD))?;
        let canonical = Self::canonical_string(params);
        if !self.scheme.verify(&canonical, provided) {
            return Err(GatewayError::SignatureMismatch);
        }

        let order_id = params
            .get(FIELD_ORDER_ID)
            .ok_or(GatewayError::MissingField(FIELD_ORDER_ID))?;
        let raw_amount = params
            .get(FIELD_AMOUNT)
            .ok_or(GatewayError::MissingField(FIELD_AMOUNT))?;
        let amount: f64 = raw_amount
            .parse()
            .map_err(|_| GatewayError::MalformedAmount(raw_amount.clone()))?;
        if !money::amount_in_range(amount) {
            return Err(GatewayError::AmountOutOfRange(amount));
        }
        let response_code = params
            .get(FIELD_RESPONSE_CODE)
            .ok_or(GatewayError::MissingField(FIELD_RESPONSE_CODE))?;

        Ok(CallbackPayload {
            order_id: order_id.clone(),
            amount,
            response_code: response_code.clone(),
            gateway_txn_no: params.get(FIELD_TRADE_NO).cloned(),
        })
    }

    /// Sign an arbitrary parameter map, for forging well-formed
    /// callbacks against a sandbox deployment.
    pub fn sign_params(&self, params: &BTreeMap<String, String>) -> String {
        self.scheme.sign(&Self::canonical_string(params))
    }
}
