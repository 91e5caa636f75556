//! Signer identities and their public addresses.

use core::{fmt, str::FromStr};

pub use alloy_primitives::Address;
use alloy_primitives::{B256, keccak256};
use bitcoin::secp256k1::{Message, PublicKey, SecretKey, ecdsa::RecoverableSignature};

use crate::{Error, SecpCtx};

/// Parses an account address, ignoring letter case.
///
/// A mixed-case checksum is accepted as written and never rejected.
pub fn parse_address(s: &str) -> Result<Address, Error> {
    Address::from_str(s.trim()).map_err(|e| Error::InvalidAddress(format!("{:?}: {}", s, e)))
}

/// Last 20 bytes of the Keccak-256 hash of the uncompressed key, without its
/// `0x04` tag.
pub(crate) fn address_of(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    Address::from_slice(&keccak256(&uncompressed[1..])[12..])
}

/// A secp256k1 key pair able to sign receipts.
///
/// Holds the secret only for as long as the caller keeps the value around;
/// nothing in this crate stores or transmits it.
#[derive(Clone)]
pub struct Identity {
    secret_key: SecretKey,
    address: Address,
}

impl Identity {
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = SecpCtx::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);

        Self {
            secret_key,
            address: address_of(&public_key),
        }
    }

    /// Parses a 32-byte hex secret, with or without `0x`.
    pub fn from_private_key_hex(key: &str) -> Result<Self, Error> {
        let trimmed = key.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != 64 {
            return Err(Error::InvalidPrivateKey(format!(
                "expected 64 hex characters, got {}",
                digits.len()
            )));
        }

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| Error::InvalidPrivateKey(e.to_string()))?;

        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|e| Error::InvalidPrivateKey(e.to_string()))?;

        Ok(Self::from_secret_key(secret_key))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Signs a prehashed 32-byte digest with a recoverable signature.
    pub(crate) fn sign_digest(&self, digest: B256) -> RecoverableSignature {
        let secp = SecpCtx::new();
        secp.sign_ecdsa_recoverable(&Message::from_digest(digest.0), &self.secret_key)
    }
}

impl FromStr for Identity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_private_key_hex(s)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Identity")
            .field("address", &format_args!("{}", self.address))
            .finish_non_exhaustive()
    }
}
