//! Legacy value-transfer transactions with EIP-155 replay protection.

use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_rlp::RlpEncodable;

use crate::Identity;

/// Gas used by a plain value transfer with no calldata.
pub const TRANSFER_GAS_LIMIT: u64 = 21_000;

/// An unsigned transfer of `value` wei to `to`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: U256,
    pub chain_id: u64,
}

/// A signed transfer ready for `eth_sendRawTransaction`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransfer {
    pub raw: Vec<u8>,
    pub hash: B256,
}

impl SignedTransfer {
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }

    pub fn hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.hash))
    }
}

/// `[nonce, gasPrice, gas, to, value, data, chainId, 0, 0]`
#[derive(RlpEncodable)]
struct SigningFields {
    nonce: u64,
    gas_price: u128,
    gas_limit: u64,
    to: Address,
    value: U256,
    input: Bytes,
    chain_id: u64,
    empty_r: u8,
    empty_s: u8,
}

/// `[nonce, gasPrice, gas, to, value, data, v, r, s]`
#[derive(RlpEncodable)]
struct SignedFields {
    nonce: u64,
    gas_price: u128,
    gas_limit: u64,
    to: Address,
    value: U256,
    input: Bytes,
    v: u64,
    r: U256,
    s: U256,
}

impl Transfer {
    pub fn signing_payload(&self) -> Vec<u8> {
        alloy_rlp::encode(SigningFields {
            nonce: self.nonce,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
            to: self.to,
            value: self.value,
            input: Bytes::new(),
            chain_id: self.chain_id,
            empty_r: 0,
            empty_s: 0,
        })
    }

    pub fn signing_hash(&self) -> B256 {
        keccak256(self.signing_payload())
    }

    pub fn sign(&self, identity: &Identity) -> SignedTransfer {
        let signature = identity.sign_digest(self.signing_hash());
        let (recovery_id, compact) = signature.serialize_compact();

        let raw = alloy_rlp::encode(SignedFields {
            nonce: self.nonce,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
            to: self.to,
            value: self.value,
            input: Bytes::new(),
            v: self.chain_id * 2 + 35 + recovery_id.to_i32() as u64,
            r: U256::from_be_slice(&compact[..32]),
            s: U256::from_be_slice(&compact[32..]),
        });
        let hash = keccak256(&raw);

        SignedTransfer { raw, hash }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_address;

    fn eip155_example() -> Transfer {
        Transfer {
            nonce: 9,
            gas_price: 20_000_000_000,
            gas_limit: TRANSFER_GAS_LIMIT,
            to: parse_address("0x3535353535353535353535353535353535353535").unwrap(),
            value: U256::from(1_000_000_000_000_000_000u128),
            chain_id: 1,
        }
    }

    #[test]
    fn test_eip155_signing_hash() {
        let tx = eip155_example();

        assert_eq!(
            hex::encode(tx.signing_payload()),
            "ec098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a764000080018080"
        );
        assert_eq!(
            hex::encode(tx.signing_hash()),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[test]
    fn test_eip155_signed_transaction() {
        let identity = Identity::from_private_key_hex(
            "0x4646464646464646464646464646464646464646464646464646464646464646",
        )
        .unwrap();
        assert_eq!(
            identity.address().to_string(),
            "0x9d8A62f656a8d1615C1294fd71e9CFb3E4855A4F"
        );

        let signed = eip155_example().sign(&identity);

        assert_eq!(
            signed.raw_hex(),
            "0xf86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        );
        assert_eq!(signed.hash, keccak256(&signed.raw));
        assert!(signed.hash_hex().starts_with("0x"));
        assert_eq!(signed.hash_hex().len(), 66);
    }

    #[test]
    fn test_zero_value_transfer_encodes_empty_value() {
        let tx = Transfer {
            value: U256::ZERO,
            ..eip155_example()
        };

        // 0x80 for the zero value, 0x80 for the empty data.
        let payload = hex::encode(tx.signing_payload());
        assert!(payload.contains("35358080018080"), "{payload}");
    }
}
