//! Sandbox resolution. Test-mode keys never reach a live processor: the
//! outcome is decided here, deterministically, so integrators can exercise
//! every terminal state without moving money.

use crate::providers::types::PaymentStatus;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Reserved test phone numbers for push-to-phone methods. Matching is on
/// the number's suffix so any country prefix works.
const RESERVED_TEST_NUMBERS: &[(&str, PaymentStatus)] = &[
    ("900000001", PaymentStatus::Completed),
    ("900000002", PaymentStatus::Failed),
    ("900000003", PaymentStatus::Pending),
];

/// Resolve a push payment outcome from the reserved-number table. Unknown
/// numbers stay pending.
pub fn resolve_push_outcome(phone: &str) -> PaymentStatus {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    for (suffix, status) in RESERVED_TEST_NUMBERS {
        if digits.ends_with(suffix) {
            return *status;
        }
    }
    PaymentStatus::Pending
}

/// Deterministic synthetic transaction id for a sandbox payment. Stable for
/// a given (partner, order reference) pair so retried test runs line up.
pub fn synthetic_transaction_id(partner_id: Uuid, order_reference: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(partner_id.as_bytes());
    hasher.update(b":");
    hasher.update(order_reference.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("SBX-{}", &digest[..16])
}

/// Synthetic entity/reference pair for sandbox reference instruments,
/// derived from the same digest so it is reproducible.
pub fn synthetic_reference(partner_id: Uuid, order_reference: &str) -> (String, String) {
    let mut hasher = Sha256::new();
    hasher.update(b"ref:");
    hasher.update(partner_id.as_bytes());
    hasher.update(order_reference.as_bytes());
    let digest = hasher.finalize();
    let entity = 10000 + (u32::from(digest[0]) * 256 + u32::from(digest[1])) % 90000;
    let number = format!(
        "{:03}{:03}{:03}",
        digest[2] as u32 % 1000,
        digest[3] as u32 % 1000,
        digest[4] as u32 % 1000
    );
    (entity.to_string(), number)
}
