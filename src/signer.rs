use alloy_primitives::eip191_hash_message;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{Error, Identity, Receipt, SignedPayload, format_timestamp};

/// Produces a receipt for one message.
///
/// Borrows the identity for the duration of signing only.
pub struct Signer<'a> {
    identity: &'a Identity,
    message: &'a str,
    timestamp: Option<DateTime<Utc>>,
}

impl<'a> Signer<'a> {
    pub fn new(identity: &'a Identity, message: &'a str) -> Self {
        Self {
            identity,
            message,
            timestamp: None,
        }
    }

    /// Stamps the receipt with `timestamp` instead of the current time.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn sign(&self) -> Result<Receipt, Error> {
        let timestamp = format_timestamp(&self.timestamp.unwrap_or_else(Utc::now));
        let signer = self.identity.address().to_string();

        let payload =
            SignedPayload::new(self.message, &timestamp, &signer).to_canonical_string()?;
        debug!(%signer, %timestamp, payload_len = payload.len(), "signing receipt payload");

        let signature = sign_message(self.identity, payload.as_bytes());

        Ok(Receipt {
            message: self.message.to_string(),
            timestamp,
            signer,
            signature,
            payment: None,
        })
    }
}

/// Signs `message` for `identity`, stamping the current time when
/// `timestamp` is `None`.
pub fn sign(
    message: &str,
    identity: &Identity,
    timestamp: Option<DateTime<Utc>>,
) -> Result<Receipt, Error> {
    let signer = Signer::new(identity, message);
    match timestamp {
        Some(timestamp) => signer.at(timestamp).sign(),
        None => signer.sign(),
    }
}

/// Signs `message` under the personal-message convention: the bytes are
/// prefixed with `"\x19Ethereum Signed Message:\n"` and their decimal length
/// before hashing.
///
/// Returns `0x`-prefixed hex of `r || s || v` with `v = 27 + recovery id`.
pub fn sign_message(identity: &Identity, message: &[u8]) -> String {
    let signature = identity.sign_digest(eip191_hash_message(message));
    let (recovery_id, compact) = signature.serialize_compact();

    let mut sig_serialized = [0u8; 65];
    sig_serialized[..64].copy_from_slice(&compact);
    sig_serialized[64] = 27 + recovery_id.to_i32() as u8;

    format!("0x{}", hex::encode(sig_serialized))
}
