//! Pluggable request signing for the payment gateway contract.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
#[error("invalid signing key")]
pub struct InvalidKeyError;

/// Signs and verifies canonical parameter strings.
///
/// The adapter owns canonicalization; implementations only turn a
/// canonical string into a hex signature and back. Moving to a
/// different acquirer's algorithm means swapping this implementation,
/// nothing else.
pub trait SignatureScheme: Send + Sync {
    fn sign(&self, canonical: &str) -> String;

    /// Constant-time comparison; `false` for malformed hex as well.
    fn verify(&self, canonical: &str, signature: &str) -> bool;
}

/// HMAC-SHA256 over the canonical string, hex-encoded.
pub struct HmacSha256Signature {
    /// Keyed prototype, cloned per operation
    mac: HmacSha256,
}

impl HmacSha256Signature {
    pub fn new(secret: &[u8]) -> Result<Self, InvalidKeyError> {
        let mac = HmacSha256::new_from_slice(secret).map_err(|_| InvalidKeyError)?;
        Ok(Self { mac })
    }
}

impl SignatureScheme for HmacSha256Signature {
    fn sign(&self, canonical: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(canonical.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn verify(&self, canonical: &str, signature: &str) -> bool {
        let Ok(raw) = hex::decode(signature) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(canonical.as_bytes());
        mac.verify_slice(&raw).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheme(secret: &str) -> HmacSha256Signature {
        HmacSha256Signature::new(secret.as_bytes()).unwrap()
    }

    #[test]
    fn sign_verify_round_trip() {
        let scheme = scheme("top-secret");
        let signature = scheme.sign("amount=270.00&orderId=o-1");
        assert!(scheme.verify("amount=270.00&orderId=o-1", &signature));
    }

    #[test]
    fn rejects_tampered_canonical() {
        let scheme = scheme("top-secret");
        let signature = scheme.sign("amount=270.00&orderId=o-1");
        assert!(!scheme.verify("amount=999.00&orderId=o-1", &signature));
    }

    #[test]
    fn rejects_wrong_secret() {
        let signer = scheme("secret-a");
        let verifier = scheme("secret-b");
        let signature = signer.sign("orderId=o-1");
        assert!(!verifier.verify("orderId=o-1", &signature));
    }

    #[test]
    fn rejects_malformed_hex() {
        let scheme = scheme("top-secret");
        assert!(!scheme.verify("orderId=o-1", "zz-not-hex"));
        assert!(!scheme.verify("orderId=o-1", ""));
    }
}
