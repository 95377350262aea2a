//! QR entry tickets
//!
//! A ticket is a compact JWS over `{ order id, nonce, issue time }`,
//! signed with a secret dedicated to ticketing. The QR code itself
//! carries no state; the consumption flag lives in order storage, and
//! flipping it moves the order `COMPLETED -> PRINTED` in the same
//! transaction. Scanning the same code twice is therefore a settled
//! race: exactly one scanner admits the customer.

use crate::settlement::storage::{ConsumeOutcome, OrderStorage, StorageError, TicketRecord};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use shared::order::OrderStatus;
use shared::ticket::{IssuedTicket, TicketVerification};
use shared::util::now_millis;
use thiserror::Error;
use tracing::{info, warn};

const NONCE_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("order is {0}, only completed orders have tickets")]
    OrderNotCompleted(OrderStatus),

    /// Bad signature, expired signature, or garbage payload. One
    /// failure mode on purpose; door devices get no oracle.
    #[error("qr payload invalid")]
    InvalidSignature,

    #[error("no ticket issued for this order")]
    TicketNotFound,

    /// A newer QR code was issued for the order; this one is dead.
    #[error("ticket superseded by a re-issue")]
    Superseded,

    #[error("ticket already used")]
    AlreadyUsed,

    #[error("ticket encoding failed: {0}")]
    Encoding(jsonwebtoken::errors::Error),

    #[error("ticket storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Serialize, Deserialize)]
struct TicketClaims {
    /// Order id
    sub: String,
    /// Random per-issue value; must match the stored ticket record
    nonce: String,
    /// Issue time (seconds)
    iat: i64,
    /// Expiry (seconds), enforced by signature validation
    exp: i64,
}

pub struct QrTicketService {
    storage: OrderStorage,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validity_minutes: i64,
}

impl QrTicketService {
    pub fn new(storage: OrderStorage, secret: &str, validity_minutes: i64) -> Self {
        Self {
            storage,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validity_minutes,
        }
    }

    /// Issue the entry ticket for a COMPLETED order.
    ///
    /// Re-issuing (lost phone, closed tab) rotates the nonce: the
    /// newest QR code is the only live one and older screenshots stop
    /// verifying. A consumed ticket never issues again.
    pub fn issue(&self, order_id: &str) -> Result<IssuedTicket, TicketError> {
        let order = self
            .storage
            .get_order(order_id)?
            .ok_or_else(|| TicketError::OrderNotFound(order_id.to_string()))?;
        if order.status != OrderStatus::Completed {
            return Err(TicketError::OrderNotCompleted(order.status));
        }
        if let Some(existing) = self.storage.get_ticket(order_id)? {
            if existing.used {
                return Err(TicketError::AlreadyUsed);
            }
        }

        let issued_at = now_millis();
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LEN)
            .map(char::from)
            .collect();
        let issued_secs = issued_at / 1000;
        let claims = TicketClaims {
            sub: order_id.to_string(),
            nonce: nonce.clone(),
            iat: issued_secs,
            exp: issued_secs + self.validity_minutes * 60,
        };
        let qr_content =
            encode(&Header::default(), &claims, &self.encoding).map_err(TicketError::Encoding)?;

        self.storage.put_ticket(&TicketRecord {
            order_id: order_id.to_string(),
            nonce,
            issued_at,
            used: false,
            used_at: None,
        })?;
        info!(order_id = order_id, "ticket issued");

        Ok(IssuedTicket {
            order_id: order_id.to_string(),
            qr_content,
            issued_at,
            expires_at: issued_at + self.validity_minutes * 60_000,
        })
    }

    /// Verify a scanned payload; with `mark_used` the ticket is
    /// consumed and the order moves to PRINTED atomically.
    ///
    /// Check order: signature and expiry, then the stored ticket and
    /// nonce, then the consumption flag, then the order state. The
    /// consuming path re-runs every check inside the storage
    /// transaction, so two racing scans settle there.
    pub fn verify(
        &self,
        qr_content: &str,
        mark_used: bool,
    ) -> Result<TicketVerification, TicketError> {
        let claims = self.decode_claims(qr_content)?;
        let ticket = self
            .storage
            .get_ticket(&claims.sub)?
            .ok_or(TicketError::TicketNotFound)?;

        if !mark_used {
            if ticket.nonce != claims.nonce {
                return Err(TicketError::Superseded);
            }
            if ticket.used {
                return Err(TicketError::AlreadyUsed);
            }
            let order = self
                .storage
                .get_order(&claims.sub)?
                .ok_or_else(|| TicketError::OrderNotFound(claims.sub.clone()))?;
            if order.status != OrderStatus::Completed {
                return Err(TicketError::OrderNotCompleted(order.status));
            }
            return Ok(TicketVerification {
                order_id: claims.sub,
                marked_used: false,
                order_status: order.status,
                issued_at: ticket.issued_at,
            });
        }

        match self.storage.consume_ticket(&claims.sub, &claims.nonce)? {
            ConsumeOutcome::Consumed(snapshot) => {
                crate::audit_log!(order_id = %snapshot.order_id, "ticket consumed at the door");
                Ok(TicketVerification {
                    order_id: snapshot.order_id,
                    marked_used: true,
                    order_status: snapshot.status,
                    issued_at: ticket.issued_at,
                })
            }
            ConsumeOutcome::AlreadyUsed { used_at } => {
                warn!(
                    target: "audit",
                    order_id = %claims.sub,
                    used_at = used_at.unwrap_or(0),
                    "reuse attempt on consumed ticket"
                );
                Err(TicketError::AlreadyUsed)
            }
            ConsumeOutcome::NonceMismatch => Err(TicketError::Superseded),
            ConsumeOutcome::NoTicket => Err(TicketError::TicketNotFound),
            ConsumeOutcome::OrderNotFound => Err(TicketError::OrderNotFound(claims.sub)),
            ConsumeOutcome::WrongState(status) => Err(TicketError::OrderNotCompleted(status)),
        }
    }

    fn decode_claims(&self, token: &str) -> Result<TicketClaims, TicketError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<TicketClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| {
                warn!(error = %err, "qr payload rejected");
                TicketError::InvalidSignature
            })
    }
}
