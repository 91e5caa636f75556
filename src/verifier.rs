//! Receipt verification by public-key recovery.

use alloy_primitives::eip191_hash_message;
use bitcoin::secp256k1::{
    Message,
    ecdsa::{RecoverableSignature, RecoveryId},
};
use tracing::debug;

use crate::{Address, Error, Receipt, SecpCtx, address_of};

/// Outcome of checking a receipt.
///
/// `valid` is false when the signature recovers to some other address than
/// the one the receipt claims.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub valid: bool,
    pub recovered_signer: Address,
}

pub struct Verifier<'a> {
    receipt: &'a Receipt,
}

impl<'a> Verifier<'a> {
    pub fn new(receipt: &'a Receipt) -> Self {
        Self { receipt }
    }

    /// Recomputes the signed payload from the receipt's own fields and checks
    /// who signed it.
    ///
    /// Only the signer over `message`, `timestamp` and `signer` is
    /// authenticated; `payment` is ignored.
    pub fn verify(&self) -> Result<VerificationResult, Error> {
        let payload = self.receipt.signed_payload().to_canonical_string()?;
        let recovered_signer = recover_signer(payload.as_bytes(), &self.receipt.signature)?;

        let valid = recovered_signer
            .to_checksum(None)
            .eq_ignore_ascii_case(&self.receipt.signer);
        debug!(
            claimed = %self.receipt.signer,
            recovered = %recovered_signer,
            valid,
            "receipt verified"
        );

        Ok(VerificationResult {
            valid,
            recovered_signer,
        })
    }
}

pub fn verify(receipt: &Receipt) -> Result<VerificationResult, Error> {
    Verifier::new(receipt).verify()
}

/// Parses and verifies a receipt in its JSON file form.
pub fn verify_json(json: &str) -> Result<VerificationResult, Error> {
    verify(&Receipt::from_json(json)?)
}

/// Recovers the address that signed `message` under the personal-message
/// convention.
pub fn recover_signer(message: &[u8], signature: &str) -> Result<Address, Error> {
    let secp = SecpCtx::new();

    let signature = decode_signature(signature)?;
    let msg = Message::from_digest(eip191_hash_message(message).0);

    let public_key = secp
        .recover_ecdsa(&msg, &signature)
        .map_err(|e| Error::InvalidSignature(e.to_string()))?;

    Ok(address_of(&public_key))
}

/// Decodes `r || s || v` (65 bytes) or the compact `r || yParityAndS`
/// (64 bytes) form, `0x`-prefixed hex with nothing around it.
fn decode_signature(signature: &str) -> Result<RecoverableSignature, Error> {
    let digits = signature
        .strip_prefix("0x")
        .ok_or_else(|| Error::InvalidSignature("missing 0x prefix".to_string()))?;

    let bytes = hex::decode(digits).map_err(|e| Error::InvalidSignature(e.to_string()))?;

    let (compact, recovery_id) = match bytes.len() {
        65 => {
            let recovery_id = match bytes[64] {
                v @ (0 | 1) => v,
                v @ (27 | 28) => v - 27,
                v => {
                    return Err(Error::InvalidSignature(format!(
                        "unsupported recovery byte {}",
                        v
                    )));
                }
            };

            let mut compact = [0u8; 64];
            compact.copy_from_slice(&bytes[..64]);
            (compact, recovery_id)
        }
        64 => {
            let mut compact = [0u8; 64];
            compact.copy_from_slice(&bytes);

            let recovery_id = compact[32] >> 7;
            compact[32] &= 0x7f;
            (compact, recovery_id)
        }
        len => {
            return Err(Error::InvalidSignature(format!(
                "Invalid signature length: {} (expected 65)",
                len
            )));
        }
    };

    let recovery_id = RecoveryId::from_i32(i32::from(recovery_id))
        .map_err(|e| Error::InvalidSignature(e.to_string()))?;

    RecoverableSignature::from_compact(&compact, recovery_id)
        .map_err(|e| Error::InvalidSignature(e.to_string()))
}
