//! HMAC-SHA256 signatures of payment callbacks and webhook bodies.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::secret::Secret;

type HmacSha256 = Hmac<Sha256>;

/// Checks gateway signatures in constant time.
///
/// Client callbacks are signed with the API key secret over
/// `"{gateway_order_id}|{gateway_payment_id}"`; webhooks are signed with the
/// webhook secret over the raw request body. Both are hex encoded.
#[derive(Debug, Clone, Default)]
pub struct SignatureVerifier {
    key_secret: Option<Secret<String>>,
    webhook_secret: Option<Secret<String>>,
}

impl SignatureVerifier {
    pub fn new(key_secret: Option<Secret<String>>, webhook_secret: Option<Secret<String>>) -> Self {
        Self {
            key_secret,
            webhook_secret,
        }
    }

    /// Verifies a checkout callback signature.
    ///
    /// Without a key secret nothing verifies.
    pub fn verify_payment(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> bool {
        let Some(secret) = &self.key_secret else {
            return false;
        };
        verify(
            secret,
            payment_message(gateway_order_id, gateway_payment_id).as_bytes(),
            signature,
        )
    }

    /// Verifies a webhook body signature.
    pub fn verify_webhook(&self, body: &[u8], signature: &str) -> bool {
        let Some(secret) = &self.webhook_secret else {
            return false;
        };
        verify(secret, body, signature)
    }

    /// Signs a checkout callback the way the gateway does.
    pub fn sign_payment(&self, gateway_order_id: &str, gateway_payment_id: &str) -> Option<String> {
        let secret = self.key_secret.as_ref()?;
        sign(
            secret,
            payment_message(gateway_order_id, gateway_payment_id).as_bytes(),
        )
    }

    /// Signs a webhook body the way the gateway does.
    pub fn sign_webhook(&self, body: &[u8]) -> Option<String> {
        let secret = self.webhook_secret.as_ref()?;
        sign(secret, body)
    }
}

fn payment_message(gateway_order_id: &str, gateway_payment_id: &str) -> String {
    format!("{gateway_order_id}|{gateway_payment_id}")
}

fn keyed(secret: &Secret<String>, message: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.reveal().as_bytes()).ok()?;
    mac.update(message);
    Some(mac)
}

fn sign(secret: &Secret<String>, message: &[u8]) -> Option<String> {
    keyed(secret, message).map(|mac| hex::encode(mac.finalize().into_bytes()))
}

fn verify(secret: &Secret<String>, message: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    keyed(secret, message).is_some_and(|mac| mac.verify_slice(&expected).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(
            Some(Secret::new("key_secret".to_string())),
            Some(Secret::new("webhook_secret".to_string())),
        )
    }

    #[test]
    fn payment_signature_round_trip() {
        let v = verifier();
        let signature = v.sign_payment("order_1", "pay_1").unwrap();
        assert!(v.verify_payment("order_1", "pay_1", &signature));
        assert!(!v.verify_payment("order_1", "pay_2", &signature));
    }

    #[test]
    fn known_hmac_vector() {
        // HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog")
        let secret = Secret::new("key".to_string());
        assert_eq!(
            sign(&secret, b"The quick brown fox jumps over the lazy dog").unwrap(),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn garbage_signatures_fail() {
        let v = verifier();
        assert!(!v.verify_payment("order_1", "pay_1", "not-hex"));
        assert!(!v.verify_payment("order_1", "pay_1", ""));
        assert!(!v.verify_webhook(b"{}", "00ff"));
    }

    #[test]
    fn webhook_uses_its_own_secret() {
        let v = verifier();
        let body = br#"{"event":"payment.captured"}"#;
        let signature = v.sign_webhook(body).unwrap();
        assert!(v.verify_webhook(body, &signature));

        let payment_signed = SignatureVerifier::new(Some(Secret::new("webhook_secret".into())), None);
        assert!(!payment_signed.verify_webhook(body, &signature));
    }

    #[test]
    fn unconfigured_verifier_rejects_everything() {
        let v = SignatureVerifier::default();
        assert!(!v.verify_payment("order_1", "pay_1", "abcd"));
        assert!(v.sign_payment("order_1", "pay_1").is_none());
    }
}
