//! HMAC-SHA256 signature checks for the two places Razorpay signs things:
//! the checkout callback (`order_id|payment_id` signed with the key secret)
//! and webhook deliveries (raw body signed with the webhook secret).

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct SignatureVerifier {
    key_secret: String,
    webhook_secret: String,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Secrets stay out of logs
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    pub fn new(key_secret: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            key_secret: key_secret.into(),
            webhook_secret: webhook_secret.into(),
        }
    }

    /// Computes the expected checkout signature for an order/payment pair.
    pub fn payment_signature(&self, razorpay_order_id: &str, razorpay_payment_id: &str) -> String {
        let message = format!("{}|{}", razorpay_order_id, razorpay_payment_id);
        hmac_hex(&self.key_secret, message.as_bytes())
    }

    /// Verifies the signature the checkout frontend relays after payment.
    pub fn verify_payment_signature(
        &self,
        razorpay_order_id: &str,
        razorpay_payment_id: &str,
        supplied: &str,
    ) -> bool {
        let expected = self.payment_signature(razorpay_order_id, razorpay_payment_id);
        constant_time_eq(&expected, supplied)
    }

    /// Verifies the `X-Razorpay-Signature` header against the raw body bytes.
    /// The body must be the exact bytes received; re-serialized JSON will not
    /// match.
    pub fn verify_webhook_signature(&self, body: &[u8], supplied: &str) -> bool {
        let expected = hmac_hex(&self.webhook_secret, body);
        constant_time_eq(&expected, supplied)
    }
}

fn hmac_hex(secret: &str, message: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}
